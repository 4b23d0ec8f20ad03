//! Background texture decoding.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use vesper_core::texture as image_io;
use vesper_core::PixelFormat;

use crate::error::GraphicsError;

use super::{PendingLoad, Texture};

/// One queued decode.
pub(crate) struct LoadJob {
    pub texture: Weak<Texture>,
    pub pending: Arc<PendingLoad>,
    pub name: String,
    pub path: PathBuf,
    pub format: Option<PixelFormat>,
}

impl LoadJob {
    /// Jobs that cost no waiting slot, or that someone blocks on.
    fn bypasses_admission(&self) -> bool {
        self.pending.is_urgent() || self.pending.is_discarded() || self.texture.strong_count() == 0
    }
}

struct LoaderState {
    jobs: VecDeque<LoadJob>,
    /// Decoded `Async` textures waiting for their frame boundary upload.
    waiting: usize,
    decoding: usize,
    running: bool,
}

impl LoaderState {
    /// Index of the next job a worker may take.
    ///
    /// Regular jobs start only while decoded textures awaiting a frame
    /// boundary upload plus running decodes stay below `max_waiting`
    /// (0 = no limit).
    fn next_admissible(&self, max_waiting: usize) -> Option<usize> {
        if let Some(index) = self.jobs.iter().position(LoadJob::bypasses_admission) {
            return Some(index);
        }
        if self.jobs.is_empty() {
            return None;
        }
        (max_waiting == 0 || self.waiting + self.decoding < max_waiting).then_some(0)
    }
}

/// Pool of decoder threads fed from a FIFO job queue.
pub(crate) struct TextureLoader {
    state: Mutex<LoaderState>,
    signal: Condvar,
    workers: Mutex<Vec<JoinHandle<()>>>,
    max_waiting: usize,
}

impl TextureLoader {
    pub fn start(threads: usize, max_waiting: usize) -> Result<Arc<Self>, GraphicsError> {
        let loader = Arc::new(Self {
            state: Mutex::new(LoaderState {
                jobs: VecDeque::new(),
                waiting: 0,
                decoding: 0,
                running: true,
            }),
            signal: Condvar::new(),
            workers: Mutex::new(Vec::new()),
            max_waiting,
        });

        let mut workers = Vec::with_capacity(threads.max(1));
        for index in 0..threads.max(1) {
            let worker = loader.clone();
            let handle = std::thread::Builder::new()
                .name(format!("vesper-loader-{index}"))
                .spawn(move || worker.run())
                .map_err(|e| {
                    loader.shutdown();
                    GraphicsError::InitializationFailed(format!(
                        "cannot spawn texture loader thread: {e}"
                    ))
                })?;
            workers.push(handle);
        }
        log::debug!("Started {} texture loader threads", workers.len());
        loader.workers.lock().extend(workers);
        Ok(loader)
    }

    pub fn submit(&self, job: LoadJob) {
        self.state.lock().jobs.push_back(job);
        self.signal.notify_all();
    }

    /// Mark a load urgent and move it to the front of the queue.
    pub fn prioritize(&self, pending: &Arc<PendingLoad>) {
        pending.mark_urgent();
        let mut state = self.state.lock();
        if let Some(index) = state
            .jobs
            .iter()
            .position(|job| Arc::ptr_eq(&job.pending, pending))
        {
            if let Some(job) = state.jobs.remove(index) {
                state.jobs.push_front(job);
            }
        }
        drop(state);
        self.signal.notify_all();
    }

    pub fn add_waiting(&self) {
        self.state.lock().waiting += 1;
    }

    pub fn release_waiting(&self) {
        let mut state = self.state.lock();
        state.waiting = state.waiting.saturating_sub(1);
        drop(state);
        self.signal.notify_all();
    }

    /// Decoded `Async` textures that have not been uploaded yet.
    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiting
    }

    pub fn queued_count(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// Wait until no job is queued or decoding. A zero timeout waits
    /// without bound. Returns `false` on timeout.
    ///
    /// Jobs held back by the waiting cap keep the loader busy until the
    /// render thread uploads enough textures.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        let mut state = self.state.lock();
        while !state.jobs.is_empty() || state.decoding > 0 {
            match deadline {
                None => self.signal.wait(&mut state),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.signal.wait_for(&mut state, deadline - now);
                }
            }
        }
        true
    }

    /// Stop the workers, failing every load still queued.
    pub fn shutdown(&self) {
        let abandoned: Vec<LoadJob> = {
            let mut state = self.state.lock();
            state.running = false;
            state.jobs.drain(..).collect()
        };
        self.signal.notify_all();
        for job in abandoned {
            if let Some(texture) = job.texture.upgrade() {
                texture.abort_async_load(&job.pending);
            }
        }
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                log::error!("Texture loader thread panicked");
            }
        }
    }

    fn run(&self) {
        loop {
            let job = {
                let mut state = self.state.lock();
                loop {
                    if !state.running {
                        return;
                    }
                    if let Some(index) = state.next_admissible(self.max_waiting) {
                        state.decoding += 1;
                        break state.jobs.remove(index);
                    }
                    self.signal.wait(&mut state);
                }
            };
            if let Some(job) = job {
                self.process(job);
            }
            self.state.lock().decoding -= 1;
            self.signal.notify_all();
        }
    }

    fn process(&self, job: LoadJob) {
        if job.pending.is_discarded() {
            log::debug!("Skipping discarded load of texture {}", job.name);
            return;
        }
        let result = match job.format {
            Some(format) => image_io::load_as(&job.path, format),
            None => image_io::load(&job.path),
        };
        match job.texture.upgrade() {
            Some(texture) => {
                if !texture.complete_async_load(&job.pending, result, self) {
                    log::debug!("Dropped discarded decode of texture {}", job.name);
                }
            }
            None => log::debug!("Texture {} was destroyed while loading", job.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{TextureId, TextureKind};
    use vesper_core::CpuImage;

    fn live_texture() -> Arc<Texture> {
        Texture::from_image(
            TextureId::new(1),
            "live".into(),
            CpuImage::new(1, 1, PixelFormat::Rgba8),
            TextureKind::Managed,
            Weak::new(),
        )
    }

    fn job(pending: Arc<PendingLoad>) -> LoadJob {
        LoadJob {
            texture: Weak::new(),
            pending,
            name: "t".into(),
            path: PathBuf::from("missing.png"),
            format: None,
        }
    }

    fn loader_state(jobs: Vec<LoadJob>, waiting: usize) -> LoaderState {
        LoaderState {
            jobs: jobs.into(),
            waiting,
            decoding: 0,
            running: true,
        }
    }

    #[test]
    fn cap_holds_back_regular_jobs() {
        let live = live_texture();
        let mut regular = job(Arc::new(PendingLoad::default()));
        regular.texture = Arc::downgrade(&live);
        let state = loader_state(vec![regular], 2);
        assert_eq!(state.next_admissible(2), None);
        assert_eq!(state.next_admissible(3), Some(0));
        assert_eq!(state.next_admissible(0), Some(0));
    }

    #[test]
    fn urgent_and_discarded_jobs_bypass_cap() {
        let live = live_texture();
        let mut regular = job(Arc::new(PendingLoad::default()));
        regular.texture = Arc::downgrade(&live);
        let urgent = Arc::new(PendingLoad::default());
        urgent.mark_urgent();
        let mut urgent_job = job(urgent);
        urgent_job.texture = Arc::downgrade(&live);

        let state = loader_state(vec![regular, urgent_job], 5);
        assert_eq!(state.next_admissible(1), Some(1));

        let discarded = Arc::new(PendingLoad::default());
        discarded.discard();
        let state = loader_state(vec![job(discarded)], 5);
        assert_eq!(state.next_admissible(1), Some(0));
    }
}
