//! Crawler node.

use std::{collections::HashMap, thread};

use flume::{Receiver, Sender, TryRecvError};
use tracing::debug;

use crate::{
    common::Id,
    engine::{config::Config, CrawlReport, Engine, Info},
    CrawlError,
};

#[derive(Debug, Clone)]
/// Crawler node, running crawl jobs in a background thread.
///
/// Cloning is cheap, and every clone talks to the same thread. The thread is
/// stopped once every clone is dropped, or [Crawler::shutdown] is called.
pub struct Crawler(pub(crate) Sender<ActorMessage>);

impl Crawler {
    /// Bind the UDP socket and start the actor thread.
    ///
    /// Returns an error if the socket couldn't be bound.
    pub fn new(config: Config) -> Result<Self, std::io::Error> {
        let (sender, receiver) = flume::unbounded();
        let (bind_sender, bind_receiver) = flume::bounded::<Result<(), std::io::Error>>(1);

        thread::Builder::new()
            .name("mainline-crawl".to_string())
            .spawn(move || run(config, receiver, bind_sender))?;

        bind_receiver.recv().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                "crawler thread exited before binding",
            )
        })??;

        Ok(Crawler(sender))
    }

    /// Create a crawler with the default configuration, listening on
    /// the port in `UDP_PORT` or 6881.
    pub fn client() -> Result<Self, std::io::Error> {
        Self::new(Config::default())
    }

    // === Getters ===

    /// Information about this [Crawler] node.
    pub fn info(&self) -> Result<Info, CrawlError> {
        let (sender, receiver) = flume::bounded::<Info>(1);

        self.0
            .send(ActorMessage::Info(sender))
            .map_err(|_| CrawlError::CrawlerWasShutdown)?;

        receiver.recv().map_err(|_| CrawlError::CrawlerWasShutdown)
    }

    // === Public Methods ===

    /// Crawl the DHT for peers and nodes of `info_hash`.
    ///
    /// Blocks until the job's ttl elapses, or returns
    /// [CrawlError::AlreadyInProgress] right away if the same info hash is
    /// being crawled.
    pub fn crawl(&self, info_hash: Id) -> Result<CrawlReport, CrawlError> {
        let (sender, receiver) = flume::bounded::<Result<CrawlReport, CrawlError>>(1);

        self.0
            .send(ActorMessage::Crawl(info_hash, sender))
            .map_err(|_| CrawlError::CrawlerWasShutdown)?;

        receiver
            .recv()
            .map_err(|_| CrawlError::CrawlerWasShutdown)?
    }

    /// Shutdown the actor thread loop, pending crawls return
    /// [CrawlError::CrawlerWasShutdown].
    pub fn shutdown(&self) {
        let (sender, receiver) = flume::bounded::<()>(1);

        let _ = self.0.send(ActorMessage::Shutdown(sender));
        let _ = receiver.recv();
    }
}

fn run(
    config: Config,
    receiver: Receiver<ActorMessage>,
    bind_sender: Sender<Result<(), std::io::Error>>,
) {
    let mut engine = match Engine::new(config) {
        Ok(engine) => {
            let _ = bind_sender.send(Ok(()));
            engine
        }
        Err(error) => {
            let _ = bind_sender.send(Err(error));
            return;
        }
    };

    let mut senders: HashMap<Id, Sender<Result<CrawlReport, CrawlError>>> = HashMap::new();

    loop {
        match receiver.try_recv() {
            Ok(ActorMessage::Crawl(info_hash, sender)) => match engine.crawl(info_hash) {
                Ok(()) => {
                    senders.insert(info_hash, sender);
                }
                Err(error) => {
                    let _ = sender.send(Err(error));
                }
            },
            Ok(ActorMessage::Info(sender)) => {
                let _ = sender.send(engine.info());
            }
            Ok(ActorMessage::Shutdown(sender)) => {
                drop(engine);
                let _ = sender.send(());
                break;
            }
            Err(TryRecvError::Disconnected) => {
                // Crawler was dropped, kill this thread.
                debug!("mainline_crawl::Crawler's actor thread was shutdown after Drop.");
                break;
            }
            Err(TryRecvError::Empty) => {
                // No op
            }
        }

        for report in engine.tick() {
            if let Some(sender) = senders.remove(report.info_hash()) {
                let _ = sender.send(Ok(report));
            }
        }
    }
}

#[derive(Debug)]
pub(crate) enum ActorMessage {
    Info(Sender<Info>),
    Crawl(Id, Sender<Result<CrawlReport, CrawlError>>),
    Shutdown(Sender<()>),
}
