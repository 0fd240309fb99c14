//! AsyncCrawler node.

use crate::{
    common::Id,
    crawler::{ActorMessage, Crawler},
    engine::{CrawlReport, Info},
    CrawlError,
};

impl Crawler {
    /// Return an async version of the Crawler.
    pub fn as_async(self) -> AsyncCrawler {
        AsyncCrawler(self)
    }
}

#[derive(Debug, Clone)]
/// Async version of the Crawler node.
pub struct AsyncCrawler(Crawler);

impl AsyncCrawler {
    // === Getters ===

    /// Information about this [Crawler] node.
    pub async fn info(&self) -> Result<Info, CrawlError> {
        let (sender, receiver) = flume::bounded::<Info>(1);

        self.0
             .0
            .send(ActorMessage::Info(sender))
            .map_err(|_| CrawlError::CrawlerWasShutdown)?;

        receiver
            .recv_async()
            .await
            .map_err(|_| CrawlError::CrawlerWasShutdown)
    }

    // === Public Methods ===

    /// Async version of [Crawler::crawl].
    pub async fn crawl(&self, info_hash: Id) -> Result<CrawlReport, CrawlError> {
        let (sender, receiver) = flume::bounded::<Result<CrawlReport, CrawlError>>(1);

        self.0
             .0
            .send(ActorMessage::Crawl(info_hash, sender))
            .map_err(|_| CrawlError::CrawlerWasShutdown)?;

        receiver
            .recv_async()
            .await
            .map_err(|_| CrawlError::CrawlerWasShutdown)?
    }

    /// Shutdown the actor thread loop.
    pub async fn shutdown(&self) {
        let (sender, receiver) = flume::bounded::<()>(1);

        let _ = self.0 .0.send(ActorMessage::Shutdown(sender));
        let _ = receiver.recv_async().await;
    }
}

#[cfg(test)]
mod test {
    use std::net::UdpSocket;
    use std::time::Duration;

    use futures::executor::block_on;

    use crate::Config;

    use super::*;

    #[test]
    fn crawl_and_shutdown() {
        async fn test() {
            let node = UdpSocket::bind("127.0.0.1:0").unwrap();

            let crawler = Crawler::new(Config {
                bootstrap: vec![node.local_addr().unwrap().to_string()],
                port: Some(0),
                ttl: Duration::from_millis(100),
                ..Default::default()
            })
            .unwrap()
            .as_async();

            let info_hash = Id([0xaa; 20]);
            let report = crawler.crawl(info_hash).await.unwrap();

            assert_eq!(report.info_hash(), &info_hash);
            assert!(report.peers().is_empty());
            assert!(report.nodes().is_empty());

            assert_eq!(crawler.info().await.unwrap().active_jobs(), 0);

            crawler.shutdown().await;

            assert_eq!(
                crawler.crawl(info_hash).await,
                Err(CrawlError::CrawlerWasShutdown)
            );
        }

        block_on(test());
    }
}
