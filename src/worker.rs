//! Background jobs over a book snapshot.
//!
//! Whole-book checks run on their own thread against a clone of the book, so
//! the owning thread keeps exclusive use of the live [`Book`]. Results come
//! back through a channel and are handed to callbacks on whichever thread
//! polls the [`JobHandle`]. Cancellation is cooperative: the flag is checked
//! before the job starts and again before its result is reported, and a
//! result that arrives after cancellation is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{debug, info};

use crate::book::Book;
use crate::error::{Error, Result};

/// Shared cancellation flag, readable from inside a running job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// A long-running check over a whole book, such as validation or spell-checking.
pub trait BookJob: Send + 'static {
    type Output: Send + 'static;

    fn name(&self) -> &str;

    /// Run against a snapshot. Long jobs may poll `cancel` and return
    /// [`Error::Cancelled`] early.
    fn run(&self, book: &Book, cancel: &CancelToken) -> Result<Self::Output>;
}

/// Outcome of polling a [`JobHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The job has not finished.
    Pending,
    /// A callback ran.
    Delivered,
    /// The job was cancelled and its result dropped.
    Discarded,
}

/// Owning-thread handle to a job started with [`spawn_job`].
#[derive(Debug)]
pub struct JobHandle<R> {
    name: String,
    cancel: CancelToken,
    receiver: Receiver<Result<R>>,
    thread: Option<JoinHandle<()>>,
    finished: Option<Delivery>,
}

/// Start `job` on a new thread over `snapshot`.
///
/// The caller keeps its own book; the job only ever sees the snapshot.
pub fn spawn_job<J: BookJob>(snapshot: Book, job: J) -> Result<JobHandle<J::Output>> {
    let name = job.name().to_string();
    let cancel = CancelToken::new();
    let (tx, rx) = mpsc::channel();

    let token = cancel.clone();
    let thread = thread::Builder::new()
        .name(format!("quire-{name}"))
        .spawn(move || {
            if token.is_cancelled() {
                debug!("Job {} cancelled before start", job.name());
                return;
            }
            let result = job.run(&snapshot, &token);
            if token.is_cancelled() {
                info!("Job {} finished after cancellation, result discarded", job.name());
                return;
            }
            let _ = tx.send(result);
        })
        .map_err(|e| Error::Worker(format!("unable to start job {name}: {e}")))?;

    debug!("Started background job {name}");
    Ok(JobHandle {
        name,
        cancel,
        receiver: rx,
        thread: Some(thread),
        finished: None,
    })
}

impl<R> JobHandle<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request cancellation. Any result not yet delivered will be discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Deliver the result if the job is done, without blocking.
    ///
    /// Success goes to `on_success`, failure to `on_failure`, both on the
    /// calling thread. Once a job has been delivered or discarded, later
    /// calls return the same outcome and run nothing.
    pub fn deliver<S, F>(&mut self, on_success: S, on_failure: F) -> Delivery
    where
        S: FnOnce(R),
        F: FnOnce(Error),
    {
        if let Some(done) = self.finished {
            return done;
        }
        let received = match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) if !self.is_cancelled() => return Delivery::Pending,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        };
        self.finish(received, on_success, on_failure)
    }

    /// Block until the job ends, then deliver as [`JobHandle::deliver`] does.
    pub fn wait_and_deliver<S, F>(mut self, on_success: S, on_failure: F) -> Delivery
    where
        S: FnOnce(R),
        F: FnOnce(Error),
    {
        if let Some(done) = self.finished {
            return done;
        }
        let received = self.receiver.recv().ok();
        self.finish(received, on_success, on_failure)
    }

    fn finish<S, F>(&mut self, received: Option<Result<R>>, on_success: S, on_failure: F) -> Delivery
    where
        S: FnOnce(R),
        F: FnOnce(Error),
    {
        let outcome = if self.is_cancelled() {
            if received.is_some() {
                info!("Discarding result of cancelled job {}", self.name);
            }
            Delivery::Discarded
        } else {
            match received {
                Some(Ok(value)) => on_success(value),
                Some(Err(e)) => on_failure(e),
                None => on_failure(Error::Worker(format!(
                    "job {} ended without a result",
                    self.name
                ))),
            }
            Delivery::Delivered
        };
        if let Some(thread) = self.thread.take() {
            // A delivered job has already sent its result or exited.
            if outcome == Delivery::Delivered || thread.is_finished() {
                let _ = thread.join();
            }
        }
        self.finished = Some(outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::Sender;
    use std::sync::Mutex;

    use super::*;

    struct CountResources;

    impl BookJob for CountResources {
        type Output = usize;

        fn name(&self) -> &str {
            "count"
        }

        fn run(&self, book: &Book, _cancel: &CancelToken) -> Result<usize> {
            Ok(book.resources.len())
        }
    }

    struct Failing;

    impl BookJob for Failing {
        type Output = ();

        fn name(&self) -> &str {
            "failing"
        }

        fn run(&self, _book: &Book, _cancel: &CancelToken) -> Result<()> {
            Err(Error::Worker("validator crashed".into()))
        }
    }

    /// Waits for the test to release it, so cancellation can land mid-run.
    struct Gated {
        started: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl BookJob for Gated {
        type Output = &'static str;

        fn name(&self) -> &str {
            "gated"
        }

        fn run(&self, _book: &Book, _cancel: &CancelToken) -> Result<&'static str> {
            let _ = self.started.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            Ok("done")
        }
    }

    fn sample_book() -> Book {
        Book::from_loose_files(vec![
            ("a.xhtml", b"<p>a</p>".to_vec()),
            ("style.css", b"p {}".to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn test_success_delivered() {
        let handle = spawn_job(sample_book(), CountResources).unwrap();
        let mut seen = None;
        let outcome = handle.wait_and_deliver(|n| seen = Some(n), |e| panic!("{e}"));
        assert_eq!(outcome, Delivery::Delivered);
        assert_eq!(seen, Some(2));
    }

    #[test]
    fn test_failure_delivered_book_untouched() {
        let book = sample_book();
        let handle = spawn_job(book.clone(), Failing).unwrap();
        let mut failure = None;
        handle.wait_and_deliver(|_| panic!("unexpected success"), |e| failure = Some(e));
        assert!(matches!(failure, Some(Error::Worker(_))));
        assert_eq!(book.resources.len(), 2);
    }

    #[test]
    fn test_result_after_cancel_discarded() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let job = Gated {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        };
        let mut handle = spawn_job(sample_book(), job).unwrap();
        started_rx.recv().unwrap();

        assert_eq!(
            handle.deliver(|_| panic!("too early"), |e| panic!("{e}")),
            Delivery::Pending
        );
        handle.cancel();
        release_tx.send(()).unwrap();

        let outcome = handle.wait_and_deliver(
            |_| panic!("cancelled result applied"),
            |e| panic!("cancelled failure reported: {e}"),
        );
        assert_eq!(outcome, Delivery::Discarded);
    }

    #[test]
    fn test_deliver_polls_until_done() {
        let mut handle = spawn_job(sample_book(), CountResources).unwrap();
        let mut count = None;
        loop {
            match handle.deliver(|n| count = Some(n), |e| panic!("{e}")) {
                Delivery::Pending => thread::yield_now(),
                outcome => {
                    assert_eq!(outcome, Delivery::Delivered);
                    break;
                }
            }
        }
        assert_eq!(count, Some(2));
        assert!(handle.is_finished());
        assert_eq!(handle.deliver(|_| panic!("twice"), |e| panic!("{e}")), Delivery::Delivered);
    }
}
