#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

//! Named task spawning.
//!
//! Every racing task in the harness (trials, cancel timers, transport reads,
//! the peer itself) is spawned through here so it carries a name in trace
//! logs and, under `tokio_unstable`, in the tokio task builder.

#[cfg(tokio_unstable)]
pub fn spawn<Fut>(name: &str, future: Fut) -> tokio::task::JoinHandle<Fut::Output>
where
    Fut: futures::Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    spawn_on(name, &tokio::runtime::Handle::current(), future)
}

#[cfg(not(tokio_unstable))]
pub fn spawn<Fut>(name: &str, future: Fut) -> tokio::task::JoinHandle<Fut::Output>
where
    Fut: futures::Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    spawn_on(name, &tokio::runtime::Handle::current(), future)
}

#[cfg(tokio_unstable)]
pub fn spawn_on<Fut>(
    name: &str,
    handle: &tokio::runtime::Handle,
    future: Fut,
) -> tokio::task::JoinHandle<Fut::Output>
where
    Fut: futures::Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    log::trace!("task start: {name}");
    #[cfg(debug_assertions)]
    let future = {
        let name = name.to_owned();
        async move {
            let output = future.await;
            log::trace!("task finished: {name}");

            output
        }
    };
    tokio::task::Builder::new()
        .name(name)
        .spawn_on(future, handle)
        .unwrap()
}

#[cfg(not(tokio_unstable))]
pub fn spawn_on<Fut>(
    name: &str,
    handle: &tokio::runtime::Handle,
    future: Fut,
) -> tokio::task::JoinHandle<Fut::Output>
where
    Fut: futures::Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    log::trace!("task start: {name}");
    #[cfg(debug_assertions)]
    let future = {
        let name = name.to_owned();
        async move {
            let output = future.await;
            log::trace!("task finished: {name}");

            output
        }
    };
    handle.spawn(future)
}

#[cfg(test)]
mod tests {
    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn test_spawned_task_runs_to_completion() {
        let handle = super::spawn("test_task", async { 7_u32 });

        assert_eq!(handle.await.unwrap(), 7);
    }

    #[test_log::test(tokio::test(flavor = "multi_thread"))]
    async fn test_spawn_on_explicit_handle() {
        let handle = super::spawn_on("test_task", &tokio::runtime::Handle::current(), async {
            "done"
        });

        assert_eq!(handle.await.unwrap(), "done");
    }
}
