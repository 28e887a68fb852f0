#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use workload_controller_core as core;
pub use workload_controller_k8s_api as k8s;
pub use workload_controller_k8s_index as index;
pub use workload_controller_k8s_labeler as labeler;

mod args;
mod queue;
mod ready;
mod retry;
mod store;
mod worker;

pub use self::args::Args;
