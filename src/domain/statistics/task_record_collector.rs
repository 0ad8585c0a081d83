use std::fs::File;
use std::io::{self, Write};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::domain::task::task_record::TaskRecord;
use crate::error::Result;

/// Messages sent from the tick driver to the writer thread.
enum RecordMessage {
    Log(Box<TaskRecord>),
    Flush,
    Shutdown,
}

/// Writes one CSV row per finished task on a background thread.
///
/// The header is derived from the serialized field names of [`TaskRecord`]; rows are `;`-separated.
pub struct TaskRecordCollector {
    sender: mpsc::Sender<RecordMessage>,
    worker: Option<JoinHandle<()>>,
}

impl TaskRecordCollector {
    /// Spawns the writer thread.
    ///
    /// With `filename == None` rows go to stdout. The file is created here, so an unwritable path fails immediately
    /// with `IoError` instead of inside the writer.
    pub fn init(filename: Option<String>) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match filename {
            Some(path) => Box::new(File::create(path)?),
            None => Box::new(io::stdout()),
        };

        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            Self::worker_loop(rx, writer);
        });

        Ok(TaskRecordCollector { sender: tx, worker: Some(worker) })
    }

    fn worker_loop(rx: mpsc::Receiver<RecordMessage>, writer: Box<dyn Write + Send>) {
        let mut csv_wtr = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);

        for msg in rx {
            match msg {
                RecordMessage::Log(record) => {
                    if let Err(e) = csv_wtr.serialize(record.as_ref()) {
                        log::error!("Record collector: failed to write the row of task {}: {}", record.task_id, e);
                    }
                }
                RecordMessage::Flush => {
                    if let Err(e) = csv_wtr.flush() {
                        log::error!("Record collector: flush failed: {}", e);
                    }
                }
                RecordMessage::Shutdown => break,
            }
        }

        if let Err(e) = csv_wtr.flush() {
            log::error!("Record collector: final flush failed: {}", e);
        }
    }

    /// Queues a record. Non-blocking; a record sent after the writer died is dropped with a warning.
    pub fn add_record(&self, record: TaskRecord) {
        if self.sender.send(RecordMessage::Log(Box::new(record))).is_err() {
            log::warn!("Record collector: writer thread is gone, task record dropped.");
        }
    }

    pub fn flush(&self) {
        let _ = self.sender.send(RecordMessage::Flush);
    }

    /// Stops the writer after all queued records are written and waits for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.sender.send(RecordMessage::Shutdown);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Record collector: writer thread panicked.");
            }
        }
    }
}

impl Drop for TaskRecordCollector {
    fn drop(&mut self) {
        self.stop();
    }
}
