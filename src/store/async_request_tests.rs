// src/store/async_request_tests.rs
//
// AsyncRequest behavior tests
//
// INVARIANTS TESTED:
// - Concurrent run() calls share one service invocation and one result
// - A run started while a call's events are still going out joins that call
// - reload() replays the last arguments unchanged
// - Lifecycle events arrive in a fixed order
// - Failures keep the last good response
// - The loading floor holds fast answers in the loading state
// - destroy() silences every subscription

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::Context;
    use std::time::Duration;

    use futures::task::noop_waker_ref;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    use crate::config::RequestConfig;
    use crate::domain::Domain;
    use crate::error::{ServiceError, ServiceResult};
    use crate::services::service_fn;
    use crate::store::async_request::{AsyncRequest, RequestPhase, RequestState, RequestTopic};

    // ========================================================================
    // TEST HELPERS
    // ========================================================================

    /// Service that records its arguments and answers `len(arg)` after `delay`
    fn recording_request(
        delay: Duration,
    ) -> (AsyncRequest<String, usize>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&calls);
        let service = service_fn(move |name: String| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(name.clone());
                tokio::time::sleep(delay).await;
                Ok::<_, ServiceError>(name.len())
            }
        });
        (AsyncRequest::new(service, RequestConfig::immediate()), calls)
    }

    /// Service replaying a scripted sequence of answers
    fn scripted_request(script: Vec<ServiceResult<u32>>) -> AsyncRequest<(), u32> {
        let script = Arc::new(Mutex::new(script.into_iter()));
        let service = service_fn(move |_: ()| {
            let next = script
                .lock()
                .next()
                .unwrap_or_else(|| Err(ServiceError::transport("script exhausted")));
            async move { next }
        });
        AsyncRequest::new(service, RequestConfig::immediate())
    }

    fn record_topics(request: &AsyncRequest<(), u32>) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        request.on_loading_change(move |loading| sink.lock().push(format!("loading:{}", loading)));
        let sink = Arc::clone(&seen);
        request.on_before_request(move || sink.lock().push("before".to_string()));
        let sink = Arc::clone(&seen);
        request.on_success(move |data| sink.lock().push(format!("success:{}", data)));
        let sink = Arc::clone(&seen);
        request.on_failed(move |error| sink.lock().push(format!("failed:{}", error.message)));
        let sink = Arc::clone(&seen);
        request.on_completed(move || sink.lock().push("completed".to_string()));
        let sink = Arc::clone(&seen);
        request.on_state_change(move |state| {
            sink.lock().push(format!("state:{}:{:?}", state.loading, state.response))
        });
        let sink = Arc::clone(&seen);
        request.on_response_change(move |response| {
            sink.lock().push(format!("response:{:?}", response))
        });

        seen
    }

    // ========================================================================
    // DEDUP
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_runs_share_one_invocation() {
        let (request, calls) = recording_request(Duration::from_millis(100));

        let (first, second) = tokio::join!(
            request.run("movies".to_string()),
            request.run("shows".to_string())
        );

        assert_eq!(first, Ok(6));
        assert_eq!(second, Ok(6));
        assert_eq!(*calls.lock(), vec!["movies".to_string()]);
        assert_eq!(request.last_args(), Some("movies".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_runs_each_invoke_the_service() {
        let (request, calls) = recording_request(Duration::from_millis(10));

        assert_eq!(request.run("a".to_string()).await, Ok(1));
        assert_eq!(request.run("bb".to_string()).await, Ok(2));

        assert_eq!(calls.lock().len(), 2);
        assert_eq!(request.phase(), RequestPhase::Settled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exclusive_waits_then_uses_its_own_args() {
        let (request, calls) = recording_request(Duration::from_millis(100));

        let (first, second) = tokio::join!(
            request.run("movies".to_string()),
            request.run_exclusive("tv".to_string())
        );

        assert_eq!(first, Ok(6));
        assert_eq!(second, Ok(2));
        assert_eq!(*calls.lock(), vec!["movies".to_string(), "tv".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_is_visible_while_in_flight() {
        let (request, _calls) = recording_request(Duration::from_secs(1));
        assert_eq!(request.phase(), RequestPhase::Idle);

        let handle = tokio::spawn({
            let request = request.clone();
            async move { request.run("drive".to_string()).await }
        });
        tokio::task::yield_now().await;

        assert!(request.loading());
        assert_eq!(request.phase(), RequestPhase::Pending);

        assert_eq!(handle.await.unwrap(), Ok(5));
        assert!(!request.loading());
        assert_eq!(request.settled().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_returns_in_flight_result() {
        let (request, _calls) = recording_request(Duration::from_millis(50));

        let (ran, settled) = tokio::join!(request.run("abc".to_string()), async {
            tokio::task::yield_now().await;
            request.settled().await
        });

        assert_eq!(ran, Ok(3));
        assert_eq!(settled, Some(Ok(3)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_from_a_handler_joins_the_settling_call() {
        let request = scripted_request(vec![Ok(3), Ok(4)]);
        let seen = record_topics(&request);
        let joined = Arc::new(AtomicBool::new(false));
        let late = Arc::new(Mutex::new(None));

        let inner = request.clone();
        let flag = Arc::clone(&joined);
        let slot = Arc::clone(&late);
        request.on_success(move |_| {
            let mut slot = slot.lock();
            if slot.is_some() {
                return;
            }
            let again = inner.clone();
            let mut call = Box::pin(async move { again.run(()).await });
            // The first poll decides between joining and starting a new call
            let mut cx = Context::from_waker(noop_waker_ref());
            flag.store(call.as_mut().poll(&mut cx).is_pending(), Ordering::SeqCst);
            *slot = Some(tokio::spawn(call));
        });

        assert_eq!(request.run(()).await, Ok(3));
        let late_run = late.lock().take().unwrap();

        assert!(joined.load(Ordering::SeqCst));
        assert_eq!(late_run.await.unwrap(), Ok(3));
        assert_eq!(
            *seen.lock(),
            vec![
                "loading:true",
                "before",
                "success:3",
                "completed",
                "loading:false",
                "state:false:Some(3)",
                "response:Some(3)",
            ]
        );
        assert_eq!(request.phase(), RequestPhase::Settled);
    }

    // ========================================================================
    // RELOAD
    // ========================================================================

    #[tokio::test]
    async fn test_reload_uses_last_args() {
        let (request, calls) = recording_request(Duration::ZERO);

        assert_eq!(request.reload().await, None);
        request.run("tmdb".to_string()).await.unwrap();
        assert_eq!(request.reload().await, Some(Ok(4)));

        assert_eq!(*calls.lock(), vec!["tmdb".to_string(), "tmdb".to_string()]);
    }

    // ========================================================================
    // EVENTS & RESPONSE CACHE
    // ========================================================================

    #[tokio::test]
    async fn test_success_event_order() {
        let request = scripted_request(vec![Ok(3)]);
        let seen = record_topics(&request);

        assert_eq!(request.run(()).await, Ok(3));

        assert_eq!(
            *seen.lock(),
            vec![
                "loading:true",
                "before",
                "success:3",
                "completed",
                "loading:false",
                "state:false:Some(3)",
                "response:Some(3)",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_response() {
        let request = scripted_request(vec![Ok(3), Err(ServiceError::transport("offline"))]);
        request.run(()).await.unwrap();

        let seen = record_topics(&request);
        let result = request.run(()).await;

        assert!(result.unwrap_err().is_transport());
        assert_eq!(request.response(), Some(3));
        assert_eq!(
            request.state(),
            RequestState {
                loading: false,
                response: Some(3)
            }
        );
        assert_eq!(
            *seen.lock(),
            vec![
                "loading:true",
                "before",
                "failed:offline",
                "completed",
                "loading:false",
                "state:false:Some(3)",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_floor_delays_fast_answers() {
        let service = service_fn(|_: ()| async { Ok::<u32, ServiceError>(1) });
        let request = AsyncRequest::new(service, RequestConfig::default());

        let started = Instant::now();
        request.run(()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_floor_when_disabled() {
        let request = scripted_request(vec![Ok(1)]);

        let started = Instant::now();
        request.run(()).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_clear_restores_default() {
        let request = scripted_request(vec![Ok(9)]).with_default(0);
        assert_eq!(request.response(), Some(0));

        request.run(()).await.unwrap();
        assert_eq!(request.response(), Some(9));

        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        request.on_response_change(move |response| {
            assert_eq!(response, Some(&0));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        request.clear();
        assert_eq!(request.response(), Some(0));
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_modify_response() {
        let request = scripted_request(vec![Ok(10)]);
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        request.on_state_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!request.modify_response(|n| *n += 1));
        assert_eq!(changes.load(Ordering::SeqCst), 0);

        request.run(()).await.unwrap();
        assert!(request.modify_response(|n| *n += 1));

        assert_eq!(request.response(), Some(11));
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    // ========================================================================
    // TEARDOWN
    // ========================================================================

    #[tokio::test]
    async fn test_destroy_is_terminal() {
        let request = scripted_request(vec![Ok(1), Ok(2)]);
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        request.on_state_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&fired);
        request.on_success(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        request.run(()).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        request.destroy();
        request.destroy();

        assert_eq!(request.run(()).await, Ok(2));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(request.bus().listener_count(RequestTopic::StateChanged), 0);
    }

    #[tokio::test]
    async fn test_validation_failure_goes_to_tip_channel() {
        let request = scripted_request(vec![]);
        let tips = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&tips);
        request.on_tip(move |tip| sink.lock().push(tip.message.clone()));

        let result: ServiceResult<()> = request.validation_failed("Pick a drive first");

        assert!(result.unwrap_err().is_validation());
        assert_eq!(*tips.lock(), vec!["Pick a drive first".to_string()]);
        assert_eq!(request.phase(), RequestPhase::Idle);
    }
}
