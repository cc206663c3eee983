use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tessitura_ports::audio::AudioCaptureCallback;
use tessitura_ports::types::SampleTime;

/// Counters written by the capture thread, read by the session loop.
#[derive(Debug, Default)]
pub struct CaptureStats {
    captured_samples: AtomicU64,
    dropped_samples: AtomicU64,
    device_sample_time: AtomicU64,
}

impl CaptureStats {
    pub fn captured_samples(&self) -> u64 {
        self.captured_samples.load(Ordering::Relaxed)
    }

    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples.load(Ordering::Relaxed)
    }

    pub fn device_sample_time(&self) -> SampleTime {
        self.device_sample_time.load(Ordering::Relaxed)
    }
}

/// Producer half of the capture queue. Lives inside the device callback.
///
/// Samples that do not fit are dropped and counted; the ring is never grown
/// and nothing is allocated here.
pub struct CaptureSink {
    producer: Producer<f32>,
    stats: Arc<CaptureStats>,
}

impl AudioCaptureCallback for CaptureSink {
    fn capture(&mut self, sample_time_start: SampleTime, mono: &[f32]) {
        let writable = self.producer.slots().min(mono.len());
        if writable > 0 {
            if let Ok(chunk) = self.producer.write_chunk_uninit(writable) {
                chunk.fill_from_iter(mono[..writable].iter().copied());
            }
        }

        let dropped = (mono.len() - writable) as u64;
        if dropped > 0 {
            self.stats.dropped_samples.fetch_add(dropped, Ordering::Relaxed);
        }
        self.stats
            .captured_samples
            .fetch_add(writable as u64, Ordering::Relaxed);
        self.stats.device_sample_time.store(
            sample_time_start.saturating_add(mono.len() as u64),
            Ordering::Relaxed,
        );
    }
}

/// Consumer half: hands out complete fixed-size frames in capture order.
pub struct FrameReader {
    consumer: Consumer<f32>,
    frame: Vec<f32>,
}

impl FrameReader {
    pub fn frame_len(&self) -> usize {
        self.frame.len()
    }

    pub fn pending_samples(&self) -> usize {
        self.consumer.slots()
    }

    /// Next complete frame, or `None` until enough samples have arrived.
    /// A partial frame stays queued.
    pub fn next_frame(&mut self) -> Option<&[f32]> {
        let frame_len = self.frame.len();
        if frame_len == 0 || self.consumer.slots() < frame_len {
            return None;
        }
        let chunk = self.consumer.read_chunk(frame_len).ok()?;
        let (first, second) = chunk.as_slices();
        self.frame[..first.len()].copy_from_slice(first);
        self.frame[first.len()..].copy_from_slice(second);
        chunk.commit_all();
        Some(&self.frame)
    }
}

/// Builds the single-producer/single-consumer capture queue.
pub fn capture_queue(
    capacity_samples: usize,
    frame_len: usize,
) -> (CaptureSink, FrameReader, Arc<CaptureStats>) {
    let (producer, consumer) = RingBuffer::new(capacity_samples.max(frame_len));
    let stats = Arc::new(CaptureStats::default());
    (
        CaptureSink {
            producer,
            stats: stats.clone(),
        },
        FrameReader {
            consumer,
            frame: vec![0.0; frame_len],
        },
        stats,
    )
}
