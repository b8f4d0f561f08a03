//! The chunk server, authority over the world's chunk data. A lookup either returns
//! an already resident chunk immediately, or enqueues a generation request that a
//! background worker thread services, lookups never wait for generation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use std::{mem, thread};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use glam::{DVec3, IVec3};
use indexmap::IndexSet;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::chunk::{self, Chunk, SharedChunk};
use crate::worldgen::ChunkGenerator;
use crate::geom::{BoundingBox, Face};
use crate::{block, config};


/// The capability set common to all chunk servers. Game and render logic only ever
/// talk to this trait, so a worker-backed local server and a remote one are used the
/// same way; the remote case is also why a requested chunk is not immediately
/// available and lookups return nothing instead of waiting.
pub trait Server {

    /// If the chunk at the given coordinates is resident, return a shared handle to
    /// it. The handle is the same one the server keeps: block edits through it are
    /// seen by every other holder, and the chunk data lives until the last holder
    /// drops it, even past an unload or the server teardown.
    ///
    /// If the chunk is absent, none is returned. With `request` set, absent
    /// coordinates are additionally scheduled for generation, and a later lookup
    /// will find the chunk resident; requesting coordinates that are already pending
    /// is a free no-op. This function never blocks on generation, its cost is a few
    /// map probes under the server's lock.
    fn get_chunk(&self, cx: i32, cz: i32, request: bool) -> Option<SharedChunk>;

    /// Get block id and metadata at the given block position, reading only resident
    /// chunks. Positions in unloaded chunks or outside the world's height return
    /// none, and no request is made.
    fn get_block(&self, pos: IVec3) -> Option<(u8, u8)> {
        let (cx, cz) = chunk::calc_chunk_pos(pos)?;
        let handle = self.get_chunk(cx, cz, false)?;
        let chunk = handle.read().unwrap();
        Some(chunk.block_and_metadata(pos))
    }

    /// Cast a ray from the given origin and return the first solid block within the
    /// given distance, with the exact point and face where the ray enters it. Only
    /// resident chunks are visited, unloaded chunks are traversed as if they were
    /// empty and no request is ever made.
    fn raycast_block(&self, origin: DVec3, dir: DVec3, max_dist: f64) -> Option<RayHit> {

        let dir = dir.normalize_or_zero();
        if dir == DVec3::ZERO || max_dist <= 0.0 {
            return None;
        }

        let mut pos = origin.floor().as_ivec3();

        // Distance along the ray between two successive grid planes of each axis.
        let t_delta = dir.recip().abs();
        let mut t_next = DVec3::ZERO;
        let mut step = IVec3::ZERO;

        for axis in 0..3 {
            if dir[axis] > 0.0 {
                step[axis] = 1;
                t_next[axis] = (pos[axis] as f64 + 1.0 - origin[axis]) * t_delta[axis];
            } else if dir[axis] < 0.0 {
                step[axis] = -1;
                t_next[axis] = (origin[axis] - pos[axis] as f64) * t_delta[axis];
            } else {
                t_next[axis] = f64::INFINITY;
            }
        }

        loop {

            if let Some((id, metadata)) = self.get_block(pos) {
                if block::material(id).is_solid() {

                    let bb = BoundingBox::CUBE.offset(pos.as_dvec3());
                    let (point, face) = match bb.calc_ray_trace(origin, dir * max_dist) {
                        Some(trace) => trace,
                        // The ray starts inside this block, no face is crossed.
                        None => (origin, exit_face(dir).opposite()),
                    };

                    return Some(RayHit { pos, point, face, block: id, metadata });

                }
            }

            // Advance to the block behind the nearest grid plane.
            let axis = if t_next.x < t_next.y && t_next.x < t_next.z {
                0
            } else if t_next.y < t_next.z {
                1
            } else {
                2
            };

            if t_next[axis] > max_dist {
                return None;
            }

            pos[axis] += step[axis];
            t_next[axis] += t_delta[axis];

        }

    }

}

/// Result of a block ray cast.
#[derive(Debug, Clone, PartialEq)]
pub struct RayHit {
    /// Position of the block hit by the ray.
    pub pos: IVec3,
    /// Exact point where the ray enters the block.
    pub point: DVec3,
    /// Face of the block through which the ray entered.
    pub face: Face,
    /// Block id at the hit position.
    pub block: u8,
    /// Block metadata at the hit position.
    pub metadata: u8,
}

/// The face through which a ray leaves the block it starts in, along its dominant
/// axis.
fn exit_face(dir: DVec3) -> Face {
    let abs = dir.abs();
    let axis = if abs.x >= abs.y && abs.x >= abs.z {
        0
    } else if abs.y >= abs.z {
        1
    } else {
        2
    };
    if dir[axis] >= 0.0 { Face::POS[axis] } else { Face::NEG[axis] }
}


/// A generation failure reported by the worker, polled from
/// [`LocalServer::poll_error`]. The chunk has been removed from the in-progress set
/// without being published, so requesting it again is allowed.
#[derive(Error, Debug, Clone)]
#[error("failed generating chunk {cx}/{cz}: {reason}")]
pub struct GenerationError {
    /// Chunk X coordinate.
    pub cx: i32,
    /// Chunk Z coordinate.
    pub cz: i32,
    /// Display of the generator's error.
    pub reason: String,
}


/// Internal statistics about chunk generation, updated by the worker thread.
#[derive(Debug, Default)]
pub struct Stats {
    /// Number of chunks generated so far.
    generated_count: AtomicU64,
    /// Total duration spent in the generator, in μs.
    generated_duration: AtomicU64,
}

impl Stats {

    /// Number of chunks generated since the server started.
    pub fn generated_count(&self) -> u64 {
        self.generated_count.load(Ordering::Relaxed)
    }

    /// Total time spent in the generator since the server started.
    pub fn generated_duration(&self) -> Duration {
        Duration::from_micros(self.generated_duration.load(Ordering::Relaxed))
    }

}


/// The request sets and the resident map share a single lock: moving a coordinate
/// between any two of them must be atomic, both for the worker's batch hand-off and
/// for the duplicate-request check.
///
/// Outside of a critical section, a coordinate is in at most one of the three
/// collections.
#[derive(Default)]
struct State {
    /// Requested chunk coordinates, not yet claimed by the worker.
    queued: IndexSet<(i32, i32)>,
    /// Coordinates claimed by the worker, currently generating.
    in_progress: HashSet<(i32, i32)>,
    /// Resident chunks, available for immediate lookup.
    chunks: HashMap<(i32, i32), SharedChunk>,
}

/// State shared between the server handle and its worker thread.
struct Shared {
    state: Mutex<State>,
    stats: Stats,
}


/// A chunk server running in the current process: misses are queued and serviced by
/// a single background worker thread that owns the chunk generator. The worker is
/// stopped and joined when this structure is dropped, resident chunks are freed once
/// every outstanding handle is gone.
pub struct LocalServer {
    /// State shared with the worker thread.
    shared: Arc<Shared>,
    /// Dropping this sender disconnects the worker's stop channel.
    stop_sender: Option<Sender<()>>,
    /// Generation failures reported by the worker.
    error_receiver: Receiver<GenerationError>,
    /// Handle to the worker thread, joined on drop.
    worker: Option<thread::JoinHandle<()>>,
}

impl LocalServer {

    /// Create a new local server backed by the given generator, with the worker
    /// polling interval taken from [`config::worker_interval`].
    pub fn new<G>(generator: G) -> Self
    where
        G: ChunkGenerator + Send + 'static,
    {
        Self::with_interval(generator, config::worker_interval())
    }

    /// Create a new local server backed by the given generator and an explicit
    /// worker polling interval.
    pub fn with_interval<G>(generator: G, interval: Duration) -> Self
    where
        G: ChunkGenerator + Send + 'static,
    {

        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            stats: Stats::default(),
        });

        let (stop_sender, stop_receiver) = bounded(1);
        let (error_sender, error_receiver) = bounded(100);

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(format!("Chunk Server Worker"))
            .spawn(move || Worker {
                shared: worker_shared,
                generator,
                cache: G::Cache::default(),
                interval,
                stop_receiver,
                error_sender,
            }.run())
            .unwrap();

        Self {
            shared,
            stop_sender: Some(stop_sender),
            error_receiver,
            worker: Some(worker),
        }

    }

    /// Number of chunk requests accepted but not yet serviced, queued or currently
    /// generating.
    pub fn pending_count(&self) -> usize {
        let state = self.shared.state.lock().unwrap();
        state.queued.len() + state.in_progress.len()
    }

    /// Number of resident chunks.
    pub fn resident_count(&self) -> usize {
        self.shared.state.lock().unwrap().chunks.len()
    }

    /// Generation statistics of this server.
    pub fn stats(&self) -> &Stats {
        &self.shared.stats
    }

    /// Poll without blocking for a generation failure reported by the worker. This
    /// function returns none if there is no new failure to poll.
    pub fn poll_error(&self) -> Option<GenerationError> {
        match self.error_receiver.try_recv() {
            Ok(err) => Some(err),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!("worker should not disconnect while this handle exists"),
        }
    }

    /// Unload the chunk at the given coordinates, returning its handle if it was
    /// resident. The server itself never removes resident chunks, this is the only
    /// way one goes away before teardown. Holders of the handle keep using the chunk
    /// data, and a later request for these coordinates will generate a fresh chunk.
    pub fn remove_chunk(&self, cx: i32, cz: i32) -> Option<SharedChunk> {
        self.shared.state.lock().unwrap().chunks.remove(&(cx, cz))
    }

}

impl Server for LocalServer {

    fn get_chunk(&self, cx: i32, cz: i32, request: bool) -> Option<SharedChunk> {

        let mut state = self.shared.state.lock().unwrap();

        if let Some(handle) = state.chunks.get(&(cx, cz)) {
            return Some(Arc::clone(handle));
        }

        if request && !state.in_progress.contains(&(cx, cz)) {
            // Inserting an already queued coordinate is a no-op.
            if state.queued.insert((cx, cz)) {
                trace!("queued chunk {cx}/{cz}");
            }
        }

        None

    }

}

impl Drop for LocalServer {
    fn drop(&mut self) {
        // Disconnect the stop channel so the worker exits after its current batch,
        // then join it so no publish can outlive this server.
        drop(self.stop_sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}


/// The background worker, owning the generator and servicing the queued set for the
/// whole lifetime of the server handle.
struct Worker<G: ChunkGenerator> {
    /// State shared with the server handle.
    shared: Arc<Shared>,
    /// The chunk generator.
    generator: G,
    /// The generator's scratch state, reused between chunks.
    cache: G::Cache,
    /// Polling interval while the queued set is empty.
    interval: Duration,
    /// Disconnects when the server handle is dropped.
    stop_receiver: Receiver<()>,
    /// Failure reports back to the handle.
    error_sender: Sender<GenerationError>,
}

impl<G: ChunkGenerator> Worker<G> {

    fn run(mut self) {
        loop {
            match self.stop_receiver.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => self.service(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Claim the whole queued set in one critical section, generate every claimed
    /// chunk outside of any lock, then publish the complete batch in a second
    /// critical section. Lookups from other threads only contend on the two short
    /// sections, never on the generation itself.
    fn service(&mut self) {

        let batch: Vec<(i32, i32)> = {
            let mut state = self.shared.state.lock().unwrap();
            if state.queued.is_empty() {
                return;
            }
            let queued = mem::take(&mut state.queued);
            state.in_progress.extend(queued.iter().copied());
            queued.into_iter().collect()
        };

        debug!("claimed {} chunk requests", batch.len());

        let mut generated = Vec::with_capacity(batch.len());
        let mut failed = Vec::new();

        for (cx, cz) in batch {

            let handle = Chunk::new();
            let start = Instant::now();
            let res = {
                let mut chunk = handle.write().unwrap();
                self.generator.generate(cx, cz, &mut chunk, &mut self.cache)
            };
            let duration = start.elapsed();

            match res {
                Ok(()) => {
                    self.shared.stats.generated_count.fetch_add(1, Ordering::Relaxed);
                    self.shared.stats.generated_duration.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
                    trace!("generated chunk {cx}/{cz} in {duration:?}");
                    generated.push(((cx, cz), handle));
                }
                Err(err) => {
                    warn!("failed generating chunk {cx}/{cz}: {err}");
                    // Dropped if the report channel is full, the log above remains.
                    let _ = self.error_sender.try_send(GenerationError { cx, cz, reason: err.to_string() });
                    failed.push((cx, cz));
                }
            }

        }

        let mut state = self.shared.state.lock().unwrap();

        for (pos, handle) in generated {
            state.in_progress.remove(&pos);
            let prev = state.chunks.insert(pos, handle);
            debug_assert!(prev.is_none(), "chunk {}/{} published twice", pos.0, pos.1);
        }

        // Failed coordinates leave the in-progress set without being published, a
        // new request for them will be accepted again.
        for pos in failed {
            state.in_progress.remove(&pos);
        }

    }

}
