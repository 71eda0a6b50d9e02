//! 有界匹配队列与工作线程池
//! 入队不阻塞，队列满时立即返回 false，由调用方放行；
//! 工作线程出队后在队列之外执行分类与回调

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, error, info};

use super::handle::{Delivery, RequestHandle, Verdict};
use crate::blacklist::{Blacklist, Classification};
use crate::error::{GuardError, GuardResult};

/// 分类器：工作线程调用的纯函数
pub trait Classifier: Send + Sync + 'static {
    fn classify(&self, domain: &str, url: &str) -> Classification;
}

impl Classifier for Blacklist {
    fn classify(&self, domain: &str, url: &str) -> Classification {
        Blacklist::classify(self, domain, url)
    }
}

/// 待匹配请求
#[derive(Debug)]
pub struct MatchRequest<R> {
    pub handle: RequestHandle<R>,
    pub domain: String,
    pub url: String,
}

impl<R> MatchRequest<R> {
    pub fn new(handle: RequestHandle<R>, domain: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            handle,
            domain: domain.into(),
            url: url.into(),
        }
    }
}

/// 有界多生产者/多消费者队列
#[derive(Debug)]
pub struct MatchQueue<R> {
    sender: Option<Sender<MatchRequest<R>>>,
    receiver: Receiver<MatchRequest<R>>,
    capacity: usize,
}

impl<R> MatchQueue<R> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self {
            sender: Some(sender),
            receiver,
            capacity,
        }
    }

    /// 非阻塞入队；队列满或已关闭返回 false
    pub fn submit(&self, request: MatchRequest<R>) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };

        match sender.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(request)) => {
                debug!(
                    "Match queue full ({}), {} passes unclassified",
                    self.capacity, request.domain
                );
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// 关闭入口，已入队的请求仍会被处理
    pub fn close(&mut self) {
        self.sender = None;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// 固定大小的工作线程池
/// 持有自己的队列：线程池销毁时先关闭入口，再等工作线程处理完已接受的请求，
/// 因此被接受的请求一定会收到一次回调
#[derive(Debug)]
pub struct WorkerPool<R> {
    queue: MatchQueue<R>,
    workers: Vec<JoinHandle<()>>,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// 启动 `workers` 个线程（至少 1 个）消费队列；启动前已入队的请求同样会被处理
    pub fn spawn<C>(queue: MatchQueue<R>, classifier: Arc<C>, workers: usize) -> GuardResult<Self>
    where
        C: Classifier + ?Sized,
    {
        let mut pool = Self {
            queue,
            workers: Vec::with_capacity(workers.max(1)),
        };

        for id in 0..workers.max(1) {
            let requests = pool.queue.receiver.clone();
            let classifier = Arc::clone(&classifier);

            let worker = thread::Builder::new()
                .name(format!("tg-match-{}", id))
                .spawn(move || Self::run(id, &*classifier, requests))
                .map_err(|e| GuardError::WorkerSpawnError(e.to_string()))?;
            pool.workers.push(worker);
        }

        info!(
            "Match worker pool started: {} workers, queue capacity {}",
            pool.size(),
            pool.queue.capacity()
        );
        Ok(pool)
    }

    /// 非阻塞提交，见 [`MatchQueue::submit`]
    pub fn submit(&self, request: MatchRequest<R>) -> bool {
        self.queue.submit(request)
    }

    pub fn queue(&self) -> &MatchQueue<R> {
        &self.queue
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// 入口关闭后通道仍会交付剩余请求，取空后才断开
    fn run<C>(id: usize, classifier: &C, requests: Receiver<MatchRequest<R>>)
    where
        C: Classifier + ?Sized,
    {
        for request in requests.iter() {
            Self::process(classifier, request);
        }
        debug!("Match worker {} stopped", id);
    }

    /// 分类并投递结论；分类与回调的 panic 各自隔离在单个请求内
    fn process<C>(classifier: &C, request: MatchRequest<R>)
    where
        C: Classifier + ?Sized,
    {
        let MatchRequest { handle, domain, url } = request;

        let classified = panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(&domain, &url)));
        let verdict = match classified {
            Ok(Classification::NotReady) => {
                debug!("Blacklist not ready, {} passes unclassified", domain);
                Verdict::Unmatched
            }
            Ok(classification) => Verdict::from(classification),
            Err(_) => {
                error!("Classifier panicked on {}, request passes unclassified", domain);
                Verdict::Unmatched
            }
        };

        // 回调 panic 前句柄已落终态，不再重投
        match panic::catch_unwind(AssertUnwindSafe(|| handle.complete(verdict))) {
            Ok(Delivery::Discarded) => {
                debug!("Verdict for {} discarded, request already destroyed", domain);
            }
            Ok(_) => {}
            Err(_) => error!("Completion callback for {} panicked", domain),
        }
    }
}

impl<R> Drop for WorkerPool<R> {
    fn drop(&mut self) {
        self.queue.close();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Match worker thread panicked");
            }
        }
    }
}
