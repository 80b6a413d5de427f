//! The shared append-only buffer.

use std::ops::Range;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::codec;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::model::{Counts, DataBlock, Event, Header, HeaderSpec};
use crate::wait::{WaitCoordinator, WaitResult, WaitThreshold};

/// Storage of one header generation.
#[derive(Debug)]
struct Generation {
    header: Header,
    samples: Vec<u8>,
    events: Vec<Event>,
}

#[derive(Debug, Default)]
struct StoreState {
    current: Option<Generation>,
    generations: u64,
}

/// One buffer: a header plus the samples and events written under it.
///
/// Writers are serialized by an `RwLock`; readers run concurrently and
/// always see whole blocks. Counts are published to the [`WaitCoordinator`]
/// before the write lock is released, so waiters observe them in storage
/// order.
#[derive(Debug)]
pub struct BufferStore {
    state: RwLock<StoreState>,
    waits: WaitCoordinator,
    config: StoreConfig,
}

impl Default for BufferStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Grow by doubling so that appends stay amortized O(1).
fn reserve_geometric<T>(vec: &mut Vec<T>, additional: usize) {
    let needed = vec.len().saturating_add(additional);
    if needed > vec.capacity() {
        let target = needed.max(vec.capacity().saturating_mul(2));
        vec.reserve_exact(target - vec.len());
    }
}

fn check_range(beg: u64, end: u64, available: u64) -> Result<()> {
    if beg > end || end > available {
        return Err(StoreError::RangeError {
            beg,
            end,
            available,
        });
    }
    Ok(())
}

fn too_large(size: usize, max: usize) -> StoreError {
    StoreError::ResponseTooLarge {
        size: size as u64,
        max: max as u64,
    }
}

impl BufferStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            waits: WaitCoordinator::new(config.poll_interval()),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the header, discarding all samples and events.
    ///
    /// Starts a new generation; waiters blocked on the previous one return
    /// with `GenerationChanged`.
    pub fn put_header(&self, spec: HeaderSpec) -> Result<Header> {
        spec.validate()?;
        let mut state = self.write();
        state.generations += 1;
        let header = Header::from_spec(spec, state.generations);
        info!(
            generation = header.generation,
            datatype = %header.datatype,
            channels = header.channel_count,
            sample_rate = header.sample_rate,
            "header written"
        );
        state.current = Some(Generation {
            header: header.clone(),
            samples: Vec::with_capacity(self.config.initial_sample_bytes),
            events: Vec::with_capacity(self.config.initial_events),
        });
        self.waits.publish(header.counts());
        Ok(header)
    }

    pub fn get_header(&self) -> Result<Header> {
        self.read()
            .current
            .as_ref()
            .map(|generation| generation.header.clone())
            .ok_or(StoreError::NoHeader)
    }

    /// Append a block of samples; returns the new sample count.
    ///
    /// The block must match the header's datatype and channel count. A
    /// rejected block leaves the buffer untouched.
    pub fn put_data(&self, block: &DataBlock) -> Result<u64> {
        block.check_len()?;
        let mut state = self.write();
        let current = state.current.as_mut().ok_or(StoreError::NoHeader)?;
        let header = &mut current.header;
        if block.datatype != header.datatype || block.channel_count != header.channel_count {
            return Err(StoreError::TypeMismatch {
                expected_type: header.datatype,
                expected_channels: header.channel_count,
                got_type: block.datatype,
                got_channels: block.channel_count,
            });
        }

        reserve_geometric(&mut current.samples, block.data.len());
        current.samples.extend_from_slice(&block.data);
        header.sample_count += block.sample_count;
        debug!(
            generation = header.generation,
            appended = block.sample_count,
            samples = header.sample_count,
            "samples appended"
        );
        let counts = header.counts();
        self.waits.publish(counts);
        Ok(counts.samples)
    }

    /// Copy samples `[beg, end)` out of the buffer.
    pub fn get_data(&self, beg: u64, end: u64) -> Result<DataBlock> {
        self.get_data_within(Some(beg..end), usize::MAX)
    }

    /// Every sample of the current generation.
    pub fn get_all_data(&self) -> Result<DataBlock> {
        self.get_data_within(None, usize::MAX)
    }

    /// Copy a range of samples (`None` for all of them), refusing with
    /// `ResponseTooLarge` before anything is copied if the encoded block
    /// would be longer than `max_record_len` bytes.
    pub fn get_data_within(
        &self,
        range: Option<Range<u64>>,
        max_record_len: usize,
    ) -> Result<DataBlock> {
        let state = self.read();
        let current = state.current.as_ref().ok_or(StoreError::NoHeader)?;
        let header = &current.header;
        let Range { start: beg, end } = range.unwrap_or(0..header.sample_count);
        check_range(beg, end, header.sample_count)?;

        let stride = header.bytes_per_sample();
        let from = beg as usize * stride;
        let to = end as usize * stride;
        let record_len = codec::data_block_len(to - from);
        if record_len > max_record_len {
            return Err(too_large(record_len, max_record_len));
        }
        Ok(DataBlock {
            datatype: header.datatype,
            channel_count: header.channel_count,
            sample_count: end - beg,
            data: Bytes::copy_from_slice(&current.samples[from..to]),
        })
    }

    /// Append events; returns the indices they were assigned.
    ///
    /// Either every event is stored or none is.
    pub fn put_events(&self, events: Vec<Event>) -> Result<Range<u64>> {
        for event in &events {
            event.check()?;
        }
        let mut state = self.write();
        let current = state.current.as_mut().ok_or(StoreError::NoHeader)?;
        let first = current.header.event_count;
        let added = events.len();

        reserve_geometric(&mut current.events, added);
        current.events.extend(events);
        current.header.event_count += added as u64;
        debug!(
            generation = current.header.generation,
            appended = added,
            events = current.header.event_count,
            "events appended"
        );
        let counts = current.header.counts();
        self.waits.publish(counts);
        Ok(first..counts.events)
    }

    /// Clone events `[beg, end)` out of the buffer.
    pub fn get_events(&self, beg: u64, end: u64) -> Result<Vec<Event>> {
        self.get_events_within(Some(beg..end), usize::MAX)
    }

    /// Every event of the current generation.
    pub fn get_all_events(&self) -> Result<Vec<Event>> {
        self.get_events_within(None, usize::MAX)
    }

    /// Clone a range of events (`None` for all of them), refusing with
    /// `ResponseTooLarge` if their encoded records would total more than
    /// `max_record_len` bytes.
    pub fn get_events_within(
        &self,
        range: Option<Range<u64>>,
        max_record_len: usize,
    ) -> Result<Vec<Event>> {
        let state = self.read();
        let current = state.current.as_ref().ok_or(StoreError::NoHeader)?;
        let Range { start: beg, end } = range.unwrap_or(0..current.header.event_count);
        check_range(beg, end, current.header.event_count)?;

        let events = &current.events[beg as usize..end as usize];
        let record_len = events
            .iter()
            .map(codec::event_record_len)
            .fold(0usize, usize::saturating_add);
        if record_len > max_record_len {
            return Err(too_large(record_len, max_record_len));
        }
        Ok(events.to_vec())
    }

    /// Current counts, or `None` before the first header.
    pub fn counts(&self) -> Option<Counts> {
        self.read()
            .current
            .as_ref()
            .map(|generation| generation.header.counts())
    }

    /// Block until the threshold is met; see [`WaitCoordinator::wait_until`].
    pub fn wait_until<F>(
        &self,
        threshold: WaitThreshold,
        timeout: Duration,
        cancelled: F,
    ) -> Result<WaitResult>
    where
        F: FnMut() -> bool,
    {
        self.waits.wait_until(threshold, timeout, cancelled)
    }
}
