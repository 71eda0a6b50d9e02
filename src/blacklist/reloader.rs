//! 后台重载线程
//! 单槽触发：最多一个待执行的重载，重复触发合并到已排队的那次

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, error, warn};

use super::registry::Blacklist;
use crate::error::{GuardError, GuardResult};

/// 重载器
#[derive(Debug)]
pub struct Reloader {
    trigger: Option<Sender<()>>,
    completed: Arc<AtomicUsize>,
    thread: Option<JoinHandle<()>>,
}

impl Reloader {
    /// 启动重载线程（不会立即重载）
    pub fn spawn(blacklist: Arc<Blacklist>) -> GuardResult<Self> {
        let (trigger, pending) = crossbeam_channel::bounded::<()>(1);
        let completed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completed);

        let thread = thread::Builder::new()
            .name("tg-reload".to_string())
            .spawn(move || {
                for () in pending.iter() {
                    // 失败已在 reload 内记录
                    let _ = blacklist.reload();
                    counter.fetch_add(1, Ordering::AcqRel);
                }
                debug!("Reload thread stopped");
            })
            .map_err(|e| GuardError::WorkerSpawnError(e.to_string()))?;

        Ok(Self {
            trigger: Some(trigger),
            completed,
            thread: Some(thread),
        })
    }

    /// 请求一次重载，立即返回
    /// 返回 false 表示已有待执行的重载，本次被合并
    pub fn trigger(&self) -> bool {
        let Some(trigger) = &self.trigger else {
            return false;
        };

        match trigger.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("Blacklist reload already pending, trigger coalesced");
                false
            }
            Err(TrySendError::Disconnected(())) => {
                warn!("Blacklist reload thread is gone, trigger ignored");
                false
            }
        }
    }

    /// 已完成的重载次数（含失败）
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }
}

impl Drop for Reloader {
    fn drop(&mut self) {
        // 关闭通道后线程在处理完已排队的重载后退出
        drop(self.trigger.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Blacklist reload thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::blacklist::Classification;
    use crate::compiler::PatternCompiler;

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_trigger_reloads_in_background() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("ads")).unwrap();
        fs::write(dir.path().join("ads").join("domains"), "ads\\.com\n").unwrap();

        let blacklist = Arc::new(Blacklist::new(dir.path(), PatternCompiler::default()));
        let reloader = Reloader::spawn(Arc::clone(&blacklist)).unwrap();

        assert!(reloader.trigger());
        assert!(wait_for(|| reloader.completed() >= 1));
        assert!(blacklist.is_ready());
    }

    #[test]
    fn test_burst_of_triggers_is_coalesced() {
        // 测试场景：连续触发多次，实际执行次数不超过被接受的次数
        let dir = tempfile::tempdir().unwrap();
        let blacklist = Arc::new(Blacklist::new(dir.path(), PatternCompiler::default()));
        let reloader = Reloader::spawn(Arc::clone(&blacklist)).unwrap();

        let accepted = (0..50).filter(|_| reloader.trigger()).count();
        assert!(accepted >= 1);
        assert!(wait_for(|| reloader.completed() == accepted));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(reloader.completed(), accepted);
    }

    #[test]
    fn test_drop_joins_thread() {
        let dir = tempfile::tempdir().unwrap();
        let blacklist = Arc::new(Blacklist::new(dir.path(), PatternCompiler::default()));
        let reloader = Reloader::spawn(Arc::clone(&blacklist)).unwrap();
        reloader.trigger();
        drop(reloader);
        // 重载线程持有的引用已释放
        assert_eq!(Arc::strong_count(&blacklist), 1);
    }

    #[test]
    fn test_classify_keeps_previous_snapshot_during_reload() {
        // 测试场景：后台重载进行中，查询始终由旧快照或新快照完整作答，不出现未就绪
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, content: &str| {
            fs::create_dir_all(dir.path().join(name)).unwrap();
            fs::write(dir.path().join(name).join("domains"), content).unwrap();
        };
        write("ads", "ads\\.com\n");

        let blacklist = Arc::new(Blacklist::new(dir.path(), PatternCompiler::default()));
        assert_eq!(blacklist.reload().unwrap(), 1);

        // 排序靠前的新分类接管 ads.com，大分类拉长重载耗时
        write("aaa", "ads\\.com\n");
        let bulk: String = (0..5000).map(|i| format!("bulk{}\\.example\\.org\n", i)).collect();
        write("bulk", &bulk);

        let reloader = Reloader::spawn(Arc::clone(&blacklist)).unwrap();
        assert!(reloader.trigger());

        let mut rounds = 0;
        loop {
            let finished = reloader.completed() >= 1;
            match blacklist.classify("ads.com", "") {
                Classification::Matched(name) => assert!(name == "ads" || name == "aaa", "unexpected {}", name),
                other => panic!("classification during reload: {:?}", other),
            }
            rounds += 1;
            if finished {
                break;
            }
        }

        assert!(rounds > 0);
        assert!(blacklist.is_ready());
        assert_eq!(blacklist.classify("ads.com", ""), Classification::Matched("aaa".into()));
    }
}
