/*!
The background Stage 1 worker.

One worker thread per stream, started lazily the first time the stream has a
window to index ahead and joined when the stream drops. Work moves through a
single-slot mailbox guarded by a mutex and a pair of condition variables:
`has_work` wakes the worker when a job lands in the slot, `can_work` wakes
the stream when the result is ready to collect.

The job carries a whole [`Parser`] by value, so the worker never shares
buffers with the stream; the stream gets the parser back (with the window
indexed into it) from [`Worker::recv`] and swaps it into the foreground.
*/

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread,
};

use crate::{error::Result, parser::Parser};

use super::{load_window, Batch};

pub(crate) struct Worker {
    shared: Arc<Shared>,
    handle: Option<thread::JoinHandle<()>>,
}

struct Shared {
    mailbox: Mutex<Mailbox>,
    has_work: Condvar,
    can_work: Condvar,
}

#[derive(Default)]
struct Mailbox {
    job: Option<Job>,
    done: Option<(Box<Parser>, Result<Batch>)>,
    stop: bool,
}

struct Job {
    parser: Box<Parser>,
    window: InputWindow,
    final_window: bool,
}

/**
A raw view of a window of the stream's input.
*/
struct InputWindow {
    ptr: *const u8,
    len: usize,
}

// SAFETY: the window points into the input borrowed by the stream, and the
// stream joins this worker on drop, before that borrow can end
unsafe impl Send for InputWindow {}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Mailbox> {
        self.mailbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Worker {
    /**
    Start a worker thread, or `None` if the OS won't give us one.
    */
    pub(crate) fn spawn() -> Option<Worker> {
        let shared = Arc::new(Shared {
            mailbox: Mutex::new(Mailbox::default()),
            has_work: Condvar::new(),
            can_work: Condvar::new(),
        });

        let handle = thread::Builder::new()
            .name("marten-json-stage1".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run(&shared)
            })
            .ok()?;

        Some(Worker {
            shared,
            handle: Some(handle),
        })
    }

    /**
    Deposit a window for background indexing.

    The slot must be free: the stream always collects a result before
    sending the next job.
    */
    pub(crate) fn send(&self, parser: Box<Parser>, window: &[u8], final_window: bool) {
        let mut mailbox = self.shared.lock();

        test_assert!(mailbox.job.is_none() && mailbox.done.is_none());

        mailbox.job = Some(Job {
            parser,
            window: InputWindow {
                ptr: window.as_ptr(),
                len: window.len(),
            },
            final_window,
        });

        drop(mailbox);
        self.shared.has_work.notify_one();
    }

    /**
    Block until the deposited job finishes and collect the indexed parser.
    */
    pub(crate) fn recv(&self) -> (Box<Parser>, Result<Batch>) {
        let mut mailbox = self.shared.lock();

        loop {
            if let Some(done) = mailbox.done.take() {
                return done;
            }

            mailbox = self
                .shared
                .can_work
                .wait(mailbox)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        {
            let mut mailbox = self.shared.lock();
            mailbox.stop = true;
        }

        self.shared.has_work.notify_one();

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(shared: &Shared) {
    loop {
        let job = {
            let mut mailbox = shared.lock();

            loop {
                if mailbox.stop {
                    return;
                }

                if let Some(job) = mailbox.job.take() {
                    break job;
                }

                mailbox = shared
                    .has_work
                    .wait(mailbox)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let Job {
            mut parser,
            window,
            final_window,
        } = job;

        // SAFETY: the stream keeps the input alive until this worker joins
        let window = unsafe { std::slice::from_raw_parts(window.ptr, window.len) };

        let result = load_window(&mut parser, window, final_window);

        {
            let mut mailbox = shared.lock();
            mailbox.done = Some((parser, result));
        }

        shared.can_work.notify_one();
    }
}
