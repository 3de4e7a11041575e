//! Execution nodes and the handle test bodies receive.
//!
//! Every (sub)test runs as its own tokio task. Launching a node blocks the
//! caller until the node either completes or calls [`H::parallel`]; in the
//! latter case the node's task is parked in the caller's [`JoinGroup`] and
//! resumes once the caller's body has returned.
//!
//! `fail_now` and `skip_now` stop a body by unwinding with a marker that
//! names the node. The marker is absorbed at that node's own task boundary
//! and never reaches the panic hook, so it prints nothing.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinError;

use rig_core::Matcher;
use rig_types::{NodeReport, Outcome, Report};

use crate::gate::ParallelGate;
use crate::group::{JoinGroup, Panic};

/// A registered test body.
pub type TestFn = Arc<dyn Fn(H) -> BoxFuture<'static, ()> + Send + Sync>;

/// State shared by every node of one suite run.
pub(crate) struct RunContext {
    pub(crate) matcher: Matcher,
    pub(crate) gate: ParallelGate,
    pub(crate) fail_fast: bool,
    pub(crate) verbose: bool,
    report: Mutex<Report>,
    next_id: AtomicU64,
}

impl RunContext {
    pub(crate) fn new(matcher: Matcher, gate: ParallelGate, fail_fast: bool, verbose: bool) -> Self {
        Self {
            matcher,
            gate,
            fail_fast,
            verbose,
            report: Mutex::new(Report::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn record(&self, node: NodeReport) {
        self.report.lock().record(node);
    }

    pub(crate) fn take_report(&self) -> Report {
        std::mem::take(&mut *self.report.lock())
    }

    /// Progress line shown at info level in verbose mode, debug otherwise.
    fn chatty(&self, line: fmt::Arguments<'_>) {
        if self.verbose {
            tracing::info!("{}", line);
        } else {
            tracing::debug!("{}", line);
        }
    }
}

/// Unwind payload of `fail_now`/`skip_now`, addressed to one node.
struct Unwind {
    node: u64,
}

#[derive(Debug, Default)]
struct NodeState {
    failed: bool,
    skipped: bool,
    /// Body has returned or unwound.
    finished: bool,
    /// Completion ran; the node's result is final.
    done: bool,
    parallel: bool,
    output: String,
    started: Option<Instant>,
    elapsed: Duration,
}

pub(crate) struct Node {
    id: u64,
    name: String,
    depth: usize,
    parent: Option<Arc<Node>>,
    ctx: Arc<RunContext>,
    /// Level this node belongs to: the parent's children, or the suite roots.
    siblings: Arc<JoinGroup>,
    /// This node's own parallel children.
    children: Arc<JoinGroup>,
    /// Fired once, when the launcher may stop waiting on this node.
    release: Mutex<Option<oneshot::Sender<()>>>,
    state: Mutex<NodeState>,
}

impl Node {
    fn failed(&self) -> bool {
        self.state.lock().failed
    }

    fn is_parallel(&self) -> bool {
        self.state.lock().parallel
    }

    fn signal_release(&self) {
        if let Some(tx) = self.release.lock().take() {
            let _ = tx.send(());
        }
    }

    fn mark_failed(&self) {
        let mut state = self.state.lock();
        if state.done {
            drop(state);
            panic!("fail called on {} after it completed", self.name);
        }
        state.failed = true;
    }

    /// Failure arriving from a completed descendant.
    fn propagate_failure(&self) {
        self.state.lock().failed = true;
    }

    /// Stop the body. `skip` selects skipped over failed.
    fn stop(&self, skip: bool) -> ! {
        {
            let mut state = self.state.lock();
            if state.done {
                drop(state);
                panic!("fail_now called on {} after it completed", self.name);
            }
            if state.finished {
                drop(state);
                panic!("fail_now called on {} after its body returned", self.name);
            }
            if skip {
                state.skipped = true;
            } else {
                state.failed = true;
            }
            state.finished = true;
        }
        panic::resume_unwind(Box::new(Unwind { node: self.id }))
    }

    fn log(&self, at: &'static Location<'static>, msg: &str) {
        let line = decorate(at, msg);
        self.state.lock().output.push_str(&line);
    }

    /// Classify a panic that escaped this node's body.
    ///
    /// Returns the payload if it must keep unwinding past this node.
    fn absorb(&self, payload: Panic) -> Option<Panic> {
        match payload.downcast_ref::<Unwind>() {
            Some(unwind) if unwind.node == self.id => None,
            Some(_) => {
                // An ancestor's fail_now crossing this task.
                let mut state = self.state.lock();
                state.failed = true;
                state.finished = true;
                Some(payload)
            }
            None => {
                let message = panic_message(&payload);
                tracing::error!("{} panicked: {}", self.name, message);
                let mut state = self.state.lock();
                state.failed = true;
                state.finished = true;
                state.output.push_str(&format!("panic: {message}\n"));
                Some(payload)
            }
        }
    }

    /// Join the children, finalize the result, and release the launcher.
    async fn complete(&self) -> Option<Panic> {
        let parallel = self.is_parallel();
        let child_panic = self.children.join(&self.ctx.gate, parallel).await;

        let report = {
            let mut state = self.state.lock();
            if let Some(started) = state.started.take() {
                state.elapsed += started.elapsed();
            }
            state.done = true;
            let outcome = if state.failed {
                Outcome::Failed
            } else if state.skipped {
                Outcome::Skipped
            } else {
                Outcome::Passed
            };
            NodeReport {
                name: self.name.clone(),
                parent: self.parent.as_ref().map(|p| p.name.clone()),
                depth: self.depth,
                outcome,
                elapsed: state.elapsed,
                output: state.output.clone(),
            }
        };

        let secs = report.elapsed.as_secs_f64();
        if report.outcome.is_failed() {
            if let Some(parent) = &self.parent {
                parent.propagate_failure();
            }
            self.siblings.note_failure();
            tracing::warn!("--- FAIL: {} ({:.2}s)", self.name, secs);
        } else {
            self.ctx
                .chatty(format_args!("--- {}: {} ({:.2}s)", report.outcome, self.name, secs));
        }

        self.ctx.record(report);
        self.signal_release();
        child_panic
    }
}

/// Task body of a node: run, absorb, complete, re-raise.
async fn drive(node: Arc<Node>, body: BoxFuture<'static, ()>) {
    node.state.lock().started = Some(Instant::now());
    let escaped = match AssertUnwindSafe(body).catch_unwind().await {
        Ok(()) => {
            node.state.lock().finished = true;
            None
        }
        Err(payload) => node.absorb(payload),
    };
    let child_panic = node.complete().await;
    if let Some(payload) = escaped.or(child_panic) {
        panic::resume_unwind(payload);
    }
}

/// Start a node under `parent` (or as a root) and wait for it to finish or
/// go parallel. Returns true unless the node has failed by then.
pub(crate) async fn launch<B>(
    ctx: &Arc<RunContext>,
    parent: Option<&Arc<Node>>,
    group: &Arc<JoinGroup>,
    subname: &str,
    body: B,
) -> bool
where
    B: FnOnce(H) -> BoxFuture<'static, ()> + Send,
{
    let (name, should_run) = ctx.matcher.full_name(parent.map(|p| p.name.as_str()), subname);
    let parent_name = parent.map(|p| p.name.clone());
    let depth = parent.map_or(0, |p| p.depth + 1);

    if !should_run {
        tracing::trace!("{} does not match the filter", name);
        ctx.record(NodeReport::not_run(name, parent_name, depth, Outcome::Filtered));
        return true;
    }
    if ctx.fail_fast && group.has_failure() {
        ctx.chatty(format_args!("--- SKIP: {} (fail-fast)", name));
        let mut report = NodeReport::not_run(name, parent_name, depth, Outcome::FailFast);
        report.output = "skipped: an earlier test at this level failed\n".to_string();
        ctx.record(report);
        return true;
    }

    let (tx, mut rx) = oneshot::channel();
    let node = Arc::new(Node {
        id: ctx.next_id.fetch_add(1, Ordering::Relaxed),
        name,
        depth,
        parent: parent.cloned(),
        ctx: Arc::clone(ctx),
        siblings: Arc::clone(group),
        children: Arc::new(JoinGroup::new()),
        release: Mutex::new(Some(tx)),
        state: Mutex::new(NodeState::default()),
    });
    ctx.chatty(format_args!("=== RUN   {}", node.name));

    let body = body(H {
        node: Arc::clone(&node),
    });
    let mut task = tokio::spawn(drive(Arc::clone(&node), body));

    let joined = tokio::select! {
        _ = &mut rx => None,
        joined = &mut task => Some(joined),
    };
    match joined {
        Some(joined) => reraise(joined),
        None if node.is_parallel() => group.push(task),
        None => reraise(task.await),
    }
    !node.failed()
}

fn reraise(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            panic::resume_unwind(err.into_panic());
        }
    }
}

fn panic_message(payload: &Panic) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Prefix a log message with the caller's `file:line`, indenting
/// continuation lines.
fn decorate(at: &'static Location<'static>, msg: &str) -> String {
    let file = Path::new(at.file())
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or_else(|| at.file());
    let msg = msg.strip_suffix('\n').unwrap_or(msg);
    let mut out = format!("{}:{}: ", file, at.line());
    for (i, line) in msg.split('\n').enumerate() {
        if i > 0 {
            out.push_str("\n    ");
        }
        out.push_str(line);
    }
    out.push('\n');
    out
}

/// Handle to a running (sub)test.
///
/// Cheap to clone. Every clone refers to the same node.
#[derive(Clone)]
pub struct H {
    node: Arc<Node>,
}

impl fmt::Debug for H {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("H")
            .field("name", &self.node.name)
            .field("depth", &self.node.depth)
            .finish()
    }
}

impl H {
    /// Unique full name, e.g. `root/sub/leaf`.
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Nesting depth (root tests are 0).
    pub fn depth(&self) -> usize {
        self.node.depth
    }

    /// Returns true if the run reports passing tests too.
    pub fn verbose(&self) -> bool {
        self.node.ctx.verbose
    }

    /// Run `f` as a subtest named `name`.
    ///
    /// Returns once the subtest completes, or as soon as it calls
    /// [`H::parallel`]. The result is false if the subtest (or, for a
    /// sequential one, any of its descendants) failed.
    pub async fn run<F, Fut>(&self, name: &str, f: F) -> bool
    where
        F: FnOnce(H) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let node = &self.node;
        launch(&node.ctx, Some(node), &node.children, name, move |h| {
            f(h).boxed()
        })
        .await
    }

    /// Run the rest of this test in parallel with its parallel siblings.
    ///
    /// The launcher's `run` returns immediately; this call resumes once the
    /// parent's body has returned and a parallel slot is free.
    ///
    /// A second call fails the test and logs at the calling line.
    #[track_caller]
    pub fn parallel(&self) -> impl std::future::Future<Output = ()> + Send + '_ {
        let at = Location::caller();
        async move { self.pause(at).await }
    }

    async fn pause(&self, at: &'static Location<'static>) {
        let node = &self.node;
        let again = {
            let mut state = node.state.lock();
            let again = state.parallel;
            if !again {
                state.parallel = true;
                if let Some(started) = state.started.take() {
                    state.elapsed += started.elapsed();
                }
            }
            again
        };
        if again {
            node.log(at, "parallel called multiple times");
            node.stop(false);
        }

        node.ctx.chatty(format_args!("=== PAUSE {}", node.name));
        node.signal_release();
        node.siblings.wait_open().await;
        node.ctx.gate.acquire().await;
        node.ctx.chatty(format_args!("=== CONT  {}", node.name));
        node.state.lock().started = Some(Instant::now());
    }

    /// Mark the test failed and keep running.
    ///
    /// # Panics
    ///
    /// Panics if the test has already completed.
    pub fn fail(&self) {
        self.node.mark_failed();
    }

    /// Returns true if the test (or a completed descendant) has failed.
    pub fn failed(&self) -> bool {
        self.node.failed()
    }

    /// Mark the test failed and stop its body.
    pub fn fail_now(&self) -> ! {
        self.node.stop(false)
    }

    /// Record `msg` in the test's output.
    #[track_caller]
    pub fn log(&self, msg: impl fmt::Display) {
        self.node.log(Location::caller(), &msg.to_string());
    }

    /// [`H::log`] followed by [`H::fail`].
    #[track_caller]
    pub fn error(&self, msg: impl fmt::Display) {
        self.node.log(Location::caller(), &msg.to_string());
        self.node.mark_failed();
    }

    /// [`H::log`] followed by [`H::fail_now`].
    #[track_caller]
    pub fn fatal(&self, msg: impl fmt::Display) -> ! {
        self.node.log(Location::caller(), &msg.to_string());
        self.node.stop(false)
    }

    /// [`H::log`] followed by [`H::skip_now`].
    #[track_caller]
    pub fn skip(&self, msg: impl fmt::Display) -> ! {
        self.node.log(Location::caller(), &msg.to_string());
        self.node.stop(true)
    }

    /// Mark the test skipped and stop its body.
    ///
    /// A test that already failed stays failed.
    pub fn skip_now(&self) -> ! {
        self.node.stop(true)
    }

    /// Returns true if the test was skipped.
    pub fn skipped(&self) -> bool {
        self.node.state.lock().skipped
    }

    /// Everything logged so far.
    pub fn output(&self) -> String {
        self.node.state.lock().output.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::Suite;
    use std::sync::atomic::AtomicUsize;

    fn suite(parallel: usize) -> Suite {
        Suite::new(RunConfig {
            parallel,
            ..RunConfig::default()
        })
    }

    #[test]
    fn decorate_prefixes_file_and_line() {
        let at = Location::caller();
        let line = decorate(at, "hello");
        assert_eq!(line, format!("node.rs:{}: hello\n", at.line()));

        let multi = decorate(at, "one\ntwo\n");
        assert!(multi.ends_with(": one\n    two\n"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_children_finish_before_run_returns() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut s = suite(4);
        {
            let done = Arc::clone(&done);
            s.register("root", move |h| {
                let done = Arc::clone(&done);
                async move {
                    let inner_done = Arc::clone(&done);
                    let group_done = Arc::clone(&done);
                    h.run("group", move |g| async move {
                        for i in 0..3 {
                            let done = Arc::clone(&inner_done);
                            g.run(&format!("p{i}"), move |p| async move {
                                p.parallel().await;
                                tokio::time::sleep(Duration::from_millis(10)).await;
                                done.fetch_add(1, Ordering::SeqCst);
                            })
                            .await;
                        }
                        // Parallel children have not started their second half yet.
                        assert_eq!(inner_done.load(Ordering::SeqCst), 0);
                    })
                    .await;
                    assert_eq!(group_done.load(Ordering::SeqCst), 3);
                }
            })
            .unwrap();
        }

        let report = s.run("").await.unwrap();
        assert!(report.is_success(), "{:?}", report.failures());
        assert_eq!(report.counts().passed, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_siblings_run_concurrently() {
        let mut s = suite(3);
        s.register("root", |h| async move {
            let barrier = Arc::new(tokio::sync::Barrier::new(3));
            for i in 0..3 {
                let barrier = Arc::clone(&barrier);
                h.run(&format!("p{i}"), move |p| async move {
                    p.parallel().await;
                    let met = tokio::time::timeout(Duration::from_secs(5), barrier.wait()).await;
                    if met.is_err() {
                        p.fatal("siblings never met");
                    }
                })
                .await;
            }
        })
        .unwrap();

        let report = s.run("").await.unwrap();
        assert!(report.is_success(), "{:?}", report.failures());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallelism_cap_is_respected() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut s = suite(1);
        {
            let (running, peak) = (Arc::clone(&running), Arc::clone(&peak));
            s.register("root", move |h| {
                let (running, peak) = (Arc::clone(&running), Arc::clone(&peak));
                async move {
                    for i in 0..4 {
                        let (running, peak) = (Arc::clone(&running), Arc::clone(&peak));
                        h.run(&format!("p{i}"), move |p| async move {
                            p.parallel().await;
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            running.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await;
                    }
                }
            })
            .unwrap();
        }

        let report = s.run("").await.unwrap();
        assert!(report.is_success());
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deep_failure_propagates_to_every_ancestor() {
        let mut s = suite(2);
        s.register("root", |h| async move {
            let ok = h
                .run("mid", |m| async move {
                    m.run("leaf", |l| async move { l.error("boom") }).await;
                    assert!(m.failed());
                })
                .await;
            assert!(!ok);
            assert!(h.failed());
        })
        .unwrap();

        let report = s.run("").await.unwrap();
        assert_eq!(
            report.failures(),
            vec!["root/mid/leaf", "root/mid", "root"]
        );
        let leaf = report.get("root/mid/leaf").unwrap();
        assert!(leaf.output.contains("node.rs:"));
        assert!(leaf.output.contains(": boom\n"));
    }

    #[tokio::test]
    async fn failed_sibling_does_not_stop_the_next_one() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut s = suite(2);
        {
            let ran = Arc::clone(&ran);
            s.register("root", move |h| {
                let ran = Arc::clone(&ran);
                async move {
                    h.run("l1", move |l| async move {
                        l.run("bad", |b| async move { b.error("boom") }).await;
                        l.run("good", move |_| async move {
                            ran.fetch_add(1, Ordering::SeqCst);
                        })
                        .await;
                    })
                    .await;
                }
            })
            .unwrap();
        }

        let report = s.run("").await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(report.get("root/l1/good").unwrap().outcome, Outcome::Passed);
        assert_eq!(report.failures(), vec!["root/l1/bad", "root/l1", "root"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn nested_parallel_levels_drain_with_a_single_slot() {
        let done = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(AtomicUsize::new(0));
        let mut s = suite(1);
        {
            let (done, seen) = (Arc::clone(&done), Arc::clone(&seen));
            s.register("root", move |h| {
                let (done, seen) = (Arc::clone(&done), Arc::clone(&seen));
                async move {
                    let inner = Arc::clone(&done);
                    h.run("mid", move |m| async move {
                        for i in 0..2 {
                            let done = Arc::clone(&inner);
                            m.run(&format!("p{i}"), move |p| async move {
                                p.parallel().await;
                                for j in 0..2 {
                                    let done = Arc::clone(&done);
                                    p.run(&format!("g{j}"), move |g| async move {
                                        g.parallel().await;
                                        done.fetch_add(1, Ordering::SeqCst);
                                    })
                                    .await;
                                }
                            })
                            .await;
                        }
                    })
                    .await;
                    seen.store(done.load(Ordering::SeqCst), Ordering::SeqCst);
                }
            })
            .unwrap();
        }

        let report = tokio::time::timeout(Duration::from_secs(5), s.run(""))
            .await
            .expect("nested parallel run deadlocked")
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 4);
        assert!(report.is_success(), "{:?}", report.failures());
        assert_eq!(report.counts().passed, 8);
    }

    #[tokio::test]
    async fn fatal_stops_only_its_own_body() {
        let after = Arc::new(AtomicUsize::new(0));
        let mut s = suite(2);
        {
            let after = Arc::clone(&after);
            s.register("root", move |h| {
                let after = Arc::clone(&after);
                async move {
                    let inner = Arc::clone(&after);
                    let ok = h
                        .run("dies", move |d| async move {
                            if !d.failed() {
                                d.fatal("stop here");
                            }
                            inner.fetch_add(100, Ordering::SeqCst);
                        })
                        .await;
                    assert!(!ok);
                    after.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        }

        let report = s.run("").await.unwrap();
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert_eq!(report.failures(), vec!["root/dies", "root"]);
    }

    #[tokio::test]
    async fn skip_does_not_affect_siblings_or_parent() {
        let mut s = suite(2);
        s.register("root", |h| async move {
            assert!(h.run("skipper", |k| async move {
                k.skip("not today");
            }).await);
            assert!(h.run("runner", |_| async {}).await);
            assert!(!h.skipped());
        })
        .unwrap();

        let report = s.run("").await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.get("root/skipper").unwrap().outcome, Outcome::Skipped);
        assert_eq!(report.get("root/runner").unwrap().outcome, Outcome::Passed);
        assert_eq!(report.get("root").unwrap().outcome, Outcome::Passed);
    }

    #[tokio::test]
    async fn failure_wins_over_skip() {
        let mut s = suite(1);
        s.register("root", |h| async move {
            h.fail();
            h.skip_now();
        })
        .unwrap();

        let report = s.run("").await.unwrap();
        assert_eq!(report.get("root").unwrap().outcome, Outcome::Failed);
    }

    #[tokio::test]
    async fn fail_now_on_parent_from_child_stops_both() {
        let reached = Arc::new(AtomicUsize::new(0));
        let mut s = suite(1);
        {
            let reached = Arc::clone(&reached);
            s.register("root", move |h| {
                let reached = Arc::clone(&reached);
                async move {
                    let parent = h.clone();
                    h.run("child", move |_c| async move {
                        parent.fail_now();
                    }).await;
                    reached.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        }

        let report = s.run("").await.unwrap();
        assert_eq!(reached.load(Ordering::SeqCst), 0);
        assert_eq!(report.failures(), vec!["root/child", "root"]);
    }

    #[tokio::test]
    async fn second_parallel_call_fails_the_test() {
        let line = Arc::new(AtomicUsize::new(0));
        let mut s = suite(2);
        {
            let line = Arc::clone(&line);
            s.register("root", move |h| {
                let line = Arc::clone(&line);
                async move {
                    h.run("twice", move |t| async move {
                        t.parallel().await;
                        line.store(line!() as usize + 1, Ordering::SeqCst);
                        t.parallel().await;
                    })
                    .await;
                }
            })
            .unwrap();
        }

        let report = s.run("").await.unwrap();
        let twice = report.get("root/twice").unwrap();
        assert_eq!(twice.outcome, Outcome::Failed);
        let expected = format!(
            "node.rs:{}: parallel called multiple times\n",
            line.load(Ordering::SeqCst)
        );
        assert_eq!(twice.output, expected);
    }

    #[tokio::test]
    async fn fail_after_completion_panics() {
        let leaked: Arc<Mutex<Option<H>>> = Arc::new(Mutex::new(None));
        let mut s = suite(1);
        {
            let leaked = Arc::clone(&leaked);
            s.register("root", move |h| {
                let leaked = Arc::clone(&leaked);
                async move {
                    *leaked.lock() = Some(h.clone());
                }
            })
            .unwrap();
        }
        s.run("").await.unwrap();

        let h = leaked.lock().take().unwrap();
        let caught = panic::catch_unwind(AssertUnwindSafe(|| h.fail()));
        let payload = caught.unwrap_err();
        assert!(panic_message(&payload).contains("after it completed"));
    }

    #[tokio::test]
    async fn unrelated_panic_fails_the_test_and_propagates() {
        let mut s = suite(1);
        s.register("root", |h| async move {
            h.run("bad", |_| async {
                panic!("unexpected");
            }).await;
        })
        .unwrap();

        let outcome = AssertUnwindSafe(s.run("")).catch_unwind().await;
        let payload = outcome.unwrap_err();
        assert_eq!(panic_message(&payload), "unexpected");
    }

    #[tokio::test]
    async fn subtest_names_are_unique() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let mut s = suite(1);
        {
            let names = Arc::clone(&names);
            s.register("root", move |h| {
                let names = Arc::clone(&names);
                async move {
                    for _ in 0..3 {
                        let names = Arc::clone(&names);
                        h.run("same name", move |c| async move {
                            names.lock().push(c.name().to_string());
                        })
                        .await;
                    }
                }
            })
            .unwrap();
        }
        s.run("").await.unwrap();
        assert_eq!(
            *names.lock(),
            vec!["root/same_name", "root/same_name#01", "root/same_name#02"]
        );
    }

    #[tokio::test]
    async fn fail_fast_skips_later_siblings() {
        let mut s = Suite::new(RunConfig {
            parallel: 1,
            fail_fast: true,
            ..RunConfig::default()
        });
        s.register("root", |h| async move {
            h.run("first", |f| async move { f.fail() }).await;
            h.run("second", |_| async {}).await;
            h.run("other", |_| async {}).await;
        })
        .unwrap();

        let report = s.run("").await.unwrap();
        assert_eq!(report.get("root/second").unwrap().outcome, Outcome::FailFast);
        assert_eq!(report.get("root/other").unwrap().outcome, Outcome::FailFast);
        assert_eq!(report.counts().fail_fast, 2);
    }

    #[tokio::test]
    async fn filtered_subtests_are_reported_but_not_run() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut s = suite(1);
        {
            let ran = Arc::clone(&ran);
            s.register("root", move |h| {
                let ran = Arc::clone(&ran);
                async move {
                    for name in ["keep", "drop"] {
                        let ran = Arc::clone(&ran);
                        h.run(name, move |_| async move {
                            ran.fetch_add(1, Ordering::SeqCst);
                        })
                        .await;
                    }
                }
            })
            .unwrap();
        }

        let report = s.run("root/keep").await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(report.get("root/drop").unwrap().outcome, Outcome::Filtered);
        assert_eq!(report.counts().filtered, 1);
    }
}
