//! # Cluster Worker
//!
//! Runs a [`ClusterIndex`] on its own OS thread so index builds never block
//! the caller's runtime. The thread owns the index outright; callers talk to
//! it through a request channel and get answers back on per-request oneshot
//! channels.
//!
//! ## Table of Contents
//! 1. Request — Messages to the worker thread
//! 2. ClusterWorker — Async handle
//! 3. Worker loop

use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

use crate::cluster::{ClusterId, ClusterIndex, ClusterNode};
use crate::config::ClusterOptions;
use crate::coords::{BoundingBox, PointOfInterest};
use crate::error::{GeoError, Result};

/// Pending requests before senders wait
const REQUEST_QUEUE: usize = 64;

// ============================================================================
// 1. Request — Messages to the worker thread
// ============================================================================

enum Request {
    Load {
        points: Vec<PointOfInterest>,
        reply: oneshot::Sender<Result<usize>>,
    },
    Clusters {
        bounds: BoundingBox,
        zoom: u8,
        reply: oneshot::Sender<Vec<ClusterNode>>,
    },
    ExpansionZoom {
        id: ClusterId,
        reply: oneshot::Sender<Result<u8>>,
    },
    Children {
        id: ClusterId,
        reply: oneshot::Sender<Result<Vec<ClusterNode>>>,
    },
    Leaves {
        id: ClusterId,
        limit: usize,
        offset: usize,
        reply: oneshot::Sender<Result<Vec<PointOfInterest>>>,
    },
}

// ============================================================================
// 2. ClusterWorker — Async handle
// ============================================================================

/// Handle to a clustering thread. Dropping it stops and joins the thread.
#[derive(Debug)]
pub struct ClusterWorker {
    sender: Option<mpsc::Sender<Request>>,
    thread: Option<JoinHandle<()>>,
}

impl ClusterWorker {
    /// Start the worker thread with no points loaded
    pub fn spawn(options: ClusterOptions) -> Result<Self> {
        let (sender, receiver) = mpsc::channel(REQUEST_QUEUE);
        let thread = std::thread::Builder::new()
            .name("cluster-worker".to_string())
            .spawn(move || run(options, receiver))
            .map_err(|err| {
                tracing::error!("Failed to start cluster worker: {}", err);
                GeoError::WorkerUnavailable
            })?;
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// Rebuild the index from `points`, returning the point count. A rejected
    /// set leaves the previous index in place.
    pub async fn load(&self, points: Vec<PointOfInterest>) -> Result<usize> {
        self.request(|reply| Request::Load { points, reply }).await?
    }

    /// Nodes visible in `bounds` at `zoom`. Empty before the first `load`.
    pub async fn clusters(&self, bounds: BoundingBox, zoom: u8) -> Result<Vec<ClusterNode>> {
        self.request(|reply| Request::Clusters { bounds, zoom, reply }).await
    }

    pub async fn expansion_zoom(&self, id: ClusterId) -> Result<u8> {
        self.request(|reply| Request::ExpansionZoom { id, reply }).await?
    }

    pub async fn children(&self, id: ClusterId) -> Result<Vec<ClusterNode>> {
        self.request(|reply| Request::Children { id, reply }).await?
    }

    pub async fn leaves(&self, id: ClusterId, limit: usize, offset: usize) -> Result<Vec<PointOfInterest>> {
        self.request(|reply| Request::Leaves {
            id,
            limit,
            offset,
            reply,
        })
        .await?
    }

    /// Stop the thread and wait for it. Later requests fail with
    /// [`GeoError::WorkerUnavailable`].
    pub fn shutdown(&mut self) {
        // Closing the channel ends the worker loop
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Cluster worker panicked");
            }
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let sender = self.sender.as_ref().ok_or(GeoError::WorkerUnavailable)?;
        let (reply, response) = oneshot::channel();
        sender
            .send(make(reply))
            .await
            .map_err(|_| GeoError::WorkerUnavailable)?;
        response.await.map_err(|_| GeoError::WorkerUnavailable)
    }
}

impl Drop for ClusterWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// 3. Worker loop
// ============================================================================

fn run(options: ClusterOptions, mut receiver: mpsc::Receiver<Request>) {
    let mut index: Option<ClusterIndex> = None;
    tracing::debug!("Cluster worker started");

    // Replies are dropped silently when the caller stopped waiting
    while let Some(request) = receiver.blocking_recv() {
        match request {
            Request::Load { points, reply } => {
                let result = ClusterIndex::build(points, &options).map(|built| {
                    let count = built.len();
                    index = Some(built);
                    count
                });
                let _ = reply.send(result);
            }
            Request::Clusters { bounds, zoom, reply } => {
                let nodes = index.as_ref().map(|i| i.query(&bounds, zoom)).unwrap_or_default();
                let _ = reply.send(nodes);
            }
            Request::ExpansionZoom { id, reply } => {
                let _ = reply.send(loaded(&index, id).and_then(|i| i.expansion_zoom(id)));
            }
            Request::Children { id, reply } => {
                let _ = reply.send(loaded(&index, id).and_then(|i| i.children(id)));
            }
            Request::Leaves {
                id,
                limit,
                offset,
                reply,
            } => {
                let _ = reply.send(loaded(&index, id).and_then(|i| i.leaves(id, limit, offset)));
            }
        }
    }

    tracing::debug!("Cluster worker stopped");
}

/// Before the first load no cluster id is known
fn loaded(index: &Option<ClusterIndex>, id: ClusterId) -> Result<&ClusterIndex> {
    index.as_ref().ok_or(GeoError::UnknownCluster(id))
}
