use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

/// Wraps an index to signal once its watch has delivered the initial list of
/// resources.
pub(crate) struct Signaled<T> {
    inner: T,
    ready: watch::Sender<bool>,
}

/// Waits until every watch has been listed. Returns false if a watch stopped
/// before it became ready.
pub(crate) async fn all(ready: impl IntoIterator<Item = watch::Receiver<bool>>) -> bool {
    for mut rx in ready {
        if rx.wait_for(|ready| *ready).await.is_err() {
            return false;
        }
    }
    true
}

// === impl Signaled ===

impl<T> Signaled<T> {
    pub(crate) fn shared(inner: T) -> (Arc<RwLock<Self>>, watch::Receiver<bool>) {
        let (ready, rx) = watch::channel(false);
        (Arc::new(RwLock::new(Self { inner, ready })), rx)
    }
}

impl<T, R> IndexNamespacedResource<R> for Signaled<Arc<RwLock<T>>>
where
    T: IndexNamespacedResource<R>,
{
    fn apply(&mut self, resource: R) {
        self.inner.write().apply(resource);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.inner.write().delete(namespace, name);
    }

    fn reset(&mut self, resources: Vec<R>, removed: NamespacedRemoved) {
        self.inner.write().reset(resources, removed);
        if !*self.ready.borrow() {
            tracing::debug!("Initial list indexed");
            self.ready.send_replace(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::{self, ResourceExt};
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_pending, assert_ready, task};

    #[derive(Default)]
    struct Names(Vec<String>);

    impl IndexNamespacedResource<k8s::Pod> for Names {
        fn apply(&mut self, pod: k8s::Pod) {
            self.0.push(pod.name_unchecked());
        }

        fn delete(&mut self, _namespace: String, name: String) {
            self.0.retain(|n| *n != name);
        }
    }

    fn mk_pod(name: &str) -> k8s::Pod {
        k8s::Pod {
            metadata: k8s::ObjectMeta {
                namespace: Some("ns".to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn signals_after_reset() {
        let names = Arc::new(RwLock::new(Names::default()));
        let (index, rx) = Signaled::shared(names.clone());

        let mut ready = task::spawn(all([rx]));
        index.write().apply(mk_pod("a"));
        assert_pending!(ready.poll());

        index
            .write()
            .reset(vec![mk_pod("b")], NamespacedRemoved::default());
        assert!(ready.is_woken());
        assert!(assert_ready!(ready.poll()));
        assert_eq!(names.read().0, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn stopped_watch_is_not_ready() {
        let (index, rx) = Signaled::shared(Arc::new(RwLock::new(Names::default())));
        drop(index);
        assert!(!all([rx]).await);
    }
}
