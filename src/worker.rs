use crate::Msg;
use crossbeam_channel::{Receiver, RecvError, TryRecvError};
use std::io::Write;
use std::{io, thread};

pub(crate) struct Worker<T: Write + Send + 'static> {
    writer: T,
    receiver: Receiver<Msg>,
    shutdown: Receiver<()>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum WorkerState {
    Empty,
    Disconnected,
    Continue,
    Shutdown,
}

impl<T: Write + Send + 'static> Worker<T> {
    pub(crate) fn new(receiver: Receiver<Msg>, writer: T, shutdown: Receiver<()>) -> Worker<T> {
        Self {
            writer,
            receiver,
            shutdown,
        }
    }

    fn handle_recv(&mut self, result: Result<Msg, RecvError>) -> io::Result<WorkerState> {
        match result {
            Ok(Msg::Line(line)) => {
                self.writer.write_all(&line)?;
                Ok(WorkerState::Continue)
            }
            Ok(Msg::Shutdown) => Ok(WorkerState::Shutdown),
            Err(_) => Ok(WorkerState::Disconnected),
        }
    }

    fn handle_try_recv(&mut self, result: Result<Msg, TryRecvError>) -> io::Result<WorkerState> {
        match result {
            Ok(Msg::Line(line)) => {
                self.writer.write_all(&line)?;
                Ok(WorkerState::Continue)
            }
            Ok(Msg::Shutdown) => Ok(WorkerState::Shutdown),
            Err(TryRecvError::Empty) => Ok(WorkerState::Empty),
            Err(TryRecvError::Disconnected) => Ok(WorkerState::Disconnected),
        }
    }

    /// Blocks on the first recv of each batch of logs, unless the
    /// channel is disconnected. Afterwards, grabs as many logs as
    /// it can off the channel, buffers them and attempts a flush.
    pub(crate) fn work(&mut self) -> io::Result<WorkerState> {
        let mut worker_state = self.handle_recv(self.receiver.recv())?;
        while worker_state == WorkerState::Continue {
            worker_state = self.handle_try_recv(self.receiver.try_recv())?;
        }
        self.writer.flush()?;
        Ok(worker_state)
    }

    /// Creates a worker thread that processes a channel until it's disconnected.
    pub(crate) fn worker_thread(mut self) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("timestamped-appender-worker".to_string())
            .spawn(move || {
                loop {
                    match self.work() {
                        Ok(WorkerState::Continue) | Ok(WorkerState::Empty) => {}
                        Ok(WorkerState::Shutdown) | Ok(WorkerState::Disconnected) => {
                            self.drain();
                            break;
                        }
                        Err(err) => {
                            eprintln!("Couldn't write logs to the underlying writer: {}", err);
                        }
                    }
                }
                // Rendezvous with the guard so its drop only returns after
                // the final flush above has happened.
                let _ = self.shutdown.recv();
            })
            .expect("failed to spawn the logging worker thread")
    }

    /// Writes out everything still queued on the channel, then flushes.
    fn drain(&mut self) {
        while let Ok(Msg::Line(line)) = self.receiver.try_recv() {
            if let Err(err) = self.writer.write_all(&line) {
                eprintln!("Couldn't write logs to the underlying writer: {}", err);
                break;
            }
        }
        if let Err(err) = self.writer.flush() {
            eprintln!("Couldn't flush the underlying writer: {}", err);
        }
    }
}
