//! TensorBoard event logging.

use crate::{common::*, utils::RateCounter};
use async_std::{fs::File, io::BufWriter};

pub use logging_message::*;
pub use logging_worker::*;

mod logging_worker {
    use super::*;

    /// The data logging worker.
    ///
    /// Training and testing scalars go to separate event files under
    /// `<logging_dir>/events/training` and `<logging_dir>/events/testing`.
    #[derive(Debug)]
    pub struct LoggingWorker {
        training_writer: EventWriter<BufWriter<File>>,
        testing_writer: EventWriter<BufWriter<File>>,
        rate_counter: RateCounter,
        rx: broadcast::Receiver<LoggingMessage>,
    }

    impl LoggingWorker {
        /// Create a data logging worker.
        async fn new(
            logging_dir: Arc<PathBuf>,
            rx: broadcast::Receiver<LoggingMessage>,
        ) -> Result<Self> {
            let event_dir = logging_dir.join("events");
            let training_writer = Self::create_writer(&event_dir, Split::Training).await?;
            let testing_writer = Self::create_writer(&event_dir, Split::Testing).await?;

            Ok(Self {
                training_writer,
                testing_writer,
                rate_counter: RateCounter::new(Duration::from_secs(60)),
                rx,
            })
        }

        async fn create_writer(event_dir: &Path, split: Split) -> Result<EventWriter<BufWriter<File>>> {
            let dir = event_dir.join(split.as_str());
            tokio::fs::create_dir_all(&dir).await?;
            let prefix = dir
                .join("inf-net")
                .into_os_string()
                .into_string()
                .map_err(|path| format_err!("non-UTF-8 path '{:?}'", path))?;
            let writer = EventWriterInit::default()
                .from_prefix_async(prefix, None)
                .await?;
            Ok(writer)
        }

        /// Start the data logging worker.
        async fn start(mut self) -> Result<()> {
            loop {
                let LoggingMessage {
                    split,
                    step,
                    scalars,
                } = match self.rx.recv().await {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!("the logger dropped {} messages", count);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                self.rate_counter.add(1.0);

                let writer = match split {
                    Split::Training => &mut self.training_writer,
                    Split::Testing => &mut self.testing_writer,
                };
                for (tag, value) in scalars {
                    writer.write_scalar_async(tag.into_owned(), step, value).await?;
                }

                if let Some(rate) = self.rate_counter.rate() {
                    info!("logged {:.2} events/s", rate);
                }
            }

            Ok(())
        }
    }

    pub async fn logging_worker(
        logging_dir: Arc<PathBuf>,
        rx: broadcast::Receiver<LoggingMessage>,
    ) -> Result<impl Future<Output = Result<()>> + Send> {
        let worker = LoggingWorker::new(logging_dir, rx).await?;
        Ok(tokio::task::spawn(worker.start()).map(|result| Fallible::Ok(result??)))
    }
}

mod logging_message {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Split {
        Training,
        Testing,
    }

    impl Split {
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::Training => "training",
                Self::Testing => "testing",
            }
        }
    }

    /// The message type that is accepted by the logging worker.
    #[derive(Debug, Clone)]
    pub struct LoggingMessage {
        pub split: Split,
        pub step: i64,
        pub scalars: Vec<(Cow<'static, str>, f32)>,
    }

    impl LoggingMessage {
        pub fn new_scalars<I, S>(split: Split, step: usize, scalars: I) -> Self
        where
            I: IntoIterator<Item = (S, f64)>,
            S: Into<Cow<'static, str>>,
        {
            Self {
                split,
                step: step as i64,
                scalars: scalars
                    .into_iter()
                    .map(|(tag, value)| (tag.into(), value as f32))
                    .collect(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_message_test() {
        let message = LoggingMessage::new_scalars(
            Split::Testing,
            40,
            [("loss2", 0.5), ("total_loss", 2.0)],
        );
        assert_eq!(message.step, 40);
        assert_eq!(message.scalars[1].0, "total_loss");
        assert_abs_diff_eq!(message.scalars[0].1, 0.5f32);
        assert_eq!(Split::Training.as_str(), "training");
    }
}
