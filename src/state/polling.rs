use crate::api::{ApiErrorKind, ApiResult};
use crate::models::TaskStatus;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FetchMode {
    /// Shows loading and surfaces errors.
    Foreground,
    /// Silent refresh: errors are logged only.
    Background,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Captured when a fetch starts; the result may only be applied while the
/// ticket is still live.
#[derive(Clone, Debug)]
pub(crate) struct PollTicket {
    pub mode: FetchMode,
    token: CancelToken,
}

impl PollTicket {
    pub fn new(mode: FetchMode, token: CancelToken) -> Self {
        Self { mode, token }
    }

    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }
}

/// Owner side of one polling loop.
#[derive(Clone, Debug, Default)]
pub(crate) struct PollHandle {
    token: CancelToken,
}

impl PollHandle {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn ticket(&self, mode: FetchMode) -> PollTicket {
        PollTicket::new(mode, self.token.clone())
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// At most one live loop per logical resource.
#[derive(Debug, Default)]
pub(crate) struct PollSlot {
    current: Mutex<Option<PollHandle>>,
}

impl PollSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, handle: PollHandle) {
        if let Ok(mut cur) = self.current.lock() {
            if let Some(prev) = cur.replace(handle) {
                prev.cancel();
            }
        }
    }

    pub fn cancel(&self) {
        if let Ok(mut cur) = self.current.lock() {
            if let Some(prev) = cur.take() {
                prev.cancel();
            }
        }
    }
}

/// Await `fut` and hand the result to `apply` unless the ticket was
/// cancelled meanwhile. Returns whether it was applied.
pub(crate) async fn poll_once<T, Fut, F>(ticket: PollTicket, fut: Fut, apply: F) -> bool
where
    Fut: Future<Output = T>,
    F: FnOnce(FetchMode, T),
{
    let value = fut.await;
    if !ticket.is_live() {
        return false;
    }
    apply(ticket.mode, value);
    true
}

/// The loop behind `start_polling`, with the executor pieces injected.
///
/// Fetches are spawned, not awaited: tick N+1 is scheduled relative to the
/// start of fetch N, so slow fetches may overlap.
pub(crate) async fn drive_polling<F, Fut, S, SFut, Sp>(
    token: CancelToken,
    interval_ms: u32,
    fetch: F,
    sleep: S,
    spawn: Sp,
) where
    F: Fn(PollTicket) -> Fut,
    S: Fn(u32) -> SFut,
    SFut: Future<Output = ()>,
    Sp: Fn(Fut),
{
    spawn(fetch(PollTicket::new(FetchMode::Foreground, token.clone())));
    loop {
        sleep(interval_ms).await;
        if token.is_cancelled() {
            break;
        }
        spawn(fetch(PollTicket::new(FetchMode::Background, token.clone())));
    }
    tracing::debug!("polling loop stopped");
}

/// Fetch now in the foreground, then every `interval_ms` in the background
/// until the returned handle is cancelled.
pub(crate) fn start_polling<F, Fut>(interval_ms: u32, fetch: F) -> PollHandle
where
    F: Fn(PollTicket) -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let handle = PollHandle::new();
    let token = handle.token.clone();
    leptos::task::spawn_local(drive_polling(
        token,
        interval_ms,
        fetch,
        |ms| gloo_timers::future::TimeoutFuture::new(ms),
        |fut| leptos::task::spawn_local(fut),
    ));
    handle
}

/// Loading/error indicator driven by polled fetches.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SyncStatus {
    pub loading: bool,
    pub error: Option<String>,
}

impl SyncStatus {
    pub fn begin(&mut self, mode: FetchMode) {
        if mode == FetchMode::Foreground {
            self.loading = true;
        }
    }

    pub fn finish<T>(&mut self, mode: FetchMode, result: &ApiResult<T>) {
        match mode {
            FetchMode::Foreground => {
                self.loading = false;
                self.error = result.as_ref().err().map(|e| e.message.clone());
            }
            FetchMode::Background => {
                if let Err(e) = result {
                    tracing::warn!("background refresh failed: {}", e.message);
                }
            }
        }
    }
}

/// Where an async generation task stands after a status check.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TaskPhase {
    Running(String),
    Succeeded(TaskStatus),
    Failed(String),
}

impl TaskPhase {
    /// Network blips keep the task running; anything else the server says
    /// is final.
    pub fn from_result(result: ApiResult<TaskStatus>) -> Self {
        match result {
            Ok(s) if s.status == "SUCCESS" => TaskPhase::Succeeded(s),
            Ok(s) if s.is_terminal() => {
                TaskPhase::Failed(s.message.unwrap_or_else(|| format!("Task {}", s.status)))
            }
            Ok(s) => TaskPhase::Running(s.status),
            Err(e) if e.kind == ApiErrorKind::Network => TaskPhase::Running("RETRYING".to_string()),
            Err(e) => TaskPhase::Failed(e.message),
        }
    }

    pub fn is_done(&self) -> bool {
        !matches!(self, TaskPhase::Running(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_cancel_discards_in_flight_result() {
        let handle = PollHandle::new();
        let ticket = handle.ticket(FetchMode::Background);
        let (tx, rx) = oneshot::channel::<u32>();
        let applied = RefCell::new(Vec::new());

        // Request starts, then the owner goes away, then the response lands.
        handle.cancel();
        tx.send(7).expect("receiver alive");
        let ok = block_on(poll_once(ticket, rx, |_, v| {
            applied.borrow_mut().push(v);
        }));

        assert!(!ok);
        assert!(applied.borrow().is_empty());
    }

    #[test]
    fn test_live_ticket_applies() {
        let handle = PollHandle::new();
        let ticket = handle.ticket(FetchMode::Foreground);
        let (tx, rx) = oneshot::channel::<u32>();
        let applied = RefCell::new(None);

        tx.send(3).expect("receiver alive");
        let ok = block_on(poll_once(ticket, rx, |mode, v| {
            *applied.borrow_mut() = Some((mode, v.ok()));
        }));

        assert!(ok);
        assert_eq!(*applied.borrow(), Some((FetchMode::Foreground, Some(3))));
    }

    #[test]
    fn test_slot_replace_cancels_previous_loop() {
        let slot = PollSlot::new();
        let a = PollHandle::new();
        let b = PollHandle::new();

        slot.replace(a.clone());
        slot.replace(b.clone());
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());

        slot.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn test_loop_foreground_then_background_until_cancel() {
        let token = CancelToken::new();
        let modes = RefCell::new(Vec::new());
        let sleeps = Cell::new(0);

        block_on(drive_polling(
            token.clone(),
            50,
            |ticket| {
                modes.borrow_mut().push(ticket.mode);
                futures::future::ready(())
            },
            |ms| {
                assert_eq!(ms, 50);
                sleeps.set(sleeps.get() + 1);
                if sleeps.get() == 3 {
                    token.cancel();
                }
                futures::future::ready(())
            },
            drop,
        ));

        assert_eq!(
            *modes.borrow(),
            vec![
                FetchMode::Foreground,
                FetchMode::Background,
                FetchMode::Background
            ]
        );
    }

    #[test]
    fn test_background_errors_do_not_touch_ui_state() {
        let mut s = SyncStatus::default();
        s.begin(FetchMode::Foreground);
        s.finish::<()>(FetchMode::Foreground, &Ok(()));
        assert_eq!(s, SyncStatus::default());

        s.begin(FetchMode::Background);
        assert!(!s.loading);
        s.finish::<()>(FetchMode::Background, &Err(ApiError::validation("down")));
        assert!(s.error.is_none());

        s.begin(FetchMode::Foreground);
        s.finish::<()>(FetchMode::Foreground, &Err(ApiError::validation("down")));
        assert!(!s.loading);
        assert_eq!(s.error.as_deref(), Some("down"));
    }

    fn status(s: &str) -> TaskStatus {
        TaskStatus {
            task_id: "t".to_string(),
            status: s.to_string(),
            result: None,
            progress: None,
            message: None,
        }
    }

    #[test]
    fn test_task_phase() {
        assert_eq!(
            TaskPhase::from_result(Ok(status("PENDING"))),
            TaskPhase::Running("PENDING".to_string())
        );
        assert!(TaskPhase::from_result(Ok(status("SUCCESS"))).is_done());
        assert!(matches!(
            TaskPhase::from_result(Ok(status("REVOKED"))),
            TaskPhase::Failed(_)
        ));
        assert_eq!(
            TaskPhase::from_result(Err(ApiError::validation("quota"))),
            TaskPhase::Failed("quota".to_string())
        );
    }
}
