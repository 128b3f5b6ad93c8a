// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use super::format::SampleEncoding;

/// Raw interleaved frames in a single fixed encoding. The length of the
/// underlying data is always a whole number of frames.
///
/// Cloning produces an independent copy, which is how a finished recording is
/// handed off to the persistence workers while capture keeps going.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    data: Vec<u8>,
    encoding: SampleEncoding,
    channels: u16,
}

impl AudioBuffer {
    pub fn new(encoding: SampleEncoding, channels: u16) -> AudioBuffer {
        AudioBuffer {
            data: Vec::new(),
            encoding,
            channels,
        }
    }

    /// Preallocates space so that appends on the capture thread don't
    /// reallocate until this many frames have been collected.
    pub fn reserve_frames(&mut self, frames: usize) {
        self.data.reserve(frames * self.bytes_per_frame());
    }

    /// Appends frame_count frames from the raw device data. If the device
    /// data is short, only the whole frames it contains are taken.
    pub fn append(&mut self, raw: &[u8], frame_count: usize) {
        let bytes_per_frame = self.bytes_per_frame();
        if bytes_per_frame == 0 {
            return;
        }
        let frames = frame_count.min(raw.len() / bytes_per_frame);
        self.data
            .extend_from_slice(&raw[..frames * bytes_per_frame]);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len_frames(&self) -> usize {
        match self.bytes_per_frame() {
            0 => 0,
            bytes_per_frame => self.data.len() / bytes_per_frame,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.encoding.bytes_per_sample() * self.channels as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn float_value(&self, frame: usize, channel: u16) -> f32 {
        self.encoding
            .float_value(&self.data, self.channels, frame, channel)
    }

    /// The largest absolute amplitude across all frames and channels.
    pub fn peak(&self) -> f32 {
        (0..self.len_frames())
            .map(|frame| self.frame_peak(frame))
            .fold(0.0, f32::max)
    }

    fn frame_peak(&self, frame: usize) -> f32 {
        (0..self.channels)
            .map(|channel| self.float_value(frame, channel).abs())
            .fold(0.0, f32::max)
    }

    fn is_loud(&self, frame: usize, threshold: f32) -> bool {
        self.frame_peak(frame) >= threshold
    }

    /// Drops leading frames below the threshold, keeping one quiet frame
    /// before the first loud one. Returns the number of frames removed.
    pub fn trim_start(&mut self, threshold: f32) -> usize {
        let frames = self.len_frames();
        match (0..frames).find(|frame| self.is_loud(*frame, threshold)) {
            Some(0) => 0,
            Some(first) => {
                let removed = first - 1;
                self.data.drain(..removed * self.bytes_per_frame());
                removed
            }
            None => {
                self.clear();
                frames
            }
        }
    }

    /// Drops trailing frames below the threshold, keeping one quiet frame
    /// after the last loud one.
    pub fn trim_end(&mut self, threshold: f32) {
        let frames = self.len_frames();
        match (0..frames).rev().find(|frame| self.is_loud(*frame, threshold)) {
            Some(last) if last + 1 == frames => {}
            Some(last) => {
                let keep = last + 2;
                self.data.truncate(keep * self.bytes_per_frame());
            }
            None => self.clear(),
        }
    }

    /// Trims both ends, returning the number of frames removed from the start.
    pub fn trim(&mut self, threshold: f32) -> usize {
        let removed = self.trim_start(threshold);
        self.trim_end(threshold);
        removed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn buffer_of(encoding: SampleEncoding, channels: u16, values: &[f32]) -> AudioBuffer {
        let mut raw = Vec::new();
        for value in values {
            encoding.encode(*value, &mut raw);
        }
        let mut buffer = AudioBuffer::new(encoding, channels);
        buffer.append(&raw, values.len() / channels as usize);
        buffer
    }

    #[test]
    fn append_takes_exact_frames() {
        let mut buffer = AudioBuffer::new(SampleEncoding::I24, 2);
        let raw = vec![0u8; 6 * 10];
        buffer.append(&raw, 4);
        assert_eq!(buffer.len_frames(), 4);
        assert_eq!(buffer.data().len(), 24);

        // Short device data only contributes whole frames.
        buffer.append(&raw[..8], 4);
        assert_eq!(buffer.len_frames(), 5);
        assert_eq!(buffer.data().len() % buffer.bytes_per_frame(), 0);
    }

    #[test]
    fn trim_keeps_one_quiet_frame_each_side() {
        let mut buffer = buffer_of(
            SampleEncoding::I16,
            1,
            &[0.0, 0.0, 0.0, 0.5, 0.6, -0.5, 0.0, 0.0, 0.0],
        );
        let removed = buffer.trim(0.1);
        assert_eq!(removed, 2);
        assert_eq!(buffer.len_frames(), 5);
        assert_eq!(buffer.float_value(0, 0), 0.0);
        assert_eq!(buffer.float_value(1, 0), 0.5);
        assert_eq!(buffer.float_value(4, 0), 0.0);
    }

    #[test]
    fn trim_silent_buffer_empties() {
        let mut buffer = buffer_of(SampleEncoding::F32, 2, &[0.01, -0.02, 0.0, 0.03]);
        buffer.trim(0.1);
        assert!(buffer.is_empty());

        let mut buffer = buffer_of(SampleEncoding::F32, 1, &[0.01, 0.02]);
        buffer.trim_end(0.1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn trim_loud_edges_is_noop() {
        let values = [0.9, 0.0, 0.0, -0.9];
        let mut buffer = buffer_of(SampleEncoding::I24, 1, &values);
        let original = buffer.clone();
        assert_eq!(buffer.trim_start(0.5), 0);
        buffer.trim_end(0.5);
        assert_eq!(buffer, original);
    }

    #[test]
    fn trim_is_idempotent() {
        let mut buffer = buffer_of(
            SampleEncoding::I32,
            2,
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.4, 0.2, 0.0, 0.0, 0.0, 0.0, 0.0],
        );
        buffer.trim(0.3);
        let once = buffer.clone();
        assert_eq!(buffer.trim(0.3), 0);
        assert_eq!(buffer, once);
    }

    #[test]
    fn any_channel_counts_as_loud() {
        let mut buffer = buffer_of(
            SampleEncoding::I16,
            2,
            &[0.0, 0.0, 0.0, 0.0, 0.0, -0.7, 0.0, 0.0],
        );
        assert_eq!(buffer.trim_start(0.5), 1);
        assert_eq!(buffer.len_frames(), 3);
    }

    #[test]
    fn clone_is_independent() {
        let mut buffer = buffer_of(SampleEncoding::U8, 1, &[0.5, 0.5]);
        let copy = buffer.clone();
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(copy.len_frames(), 2);
        assert_eq!(copy.encoding(), SampleEncoding::U8);
    }

    #[test]
    fn peak() {
        let buffer = buffer_of(SampleEncoding::F32, 2, &[0.1, -0.8, 0.3, 0.2]);
        assert_eq!(buffer.peak(), 0.8);
        assert_eq!(AudioBuffer::new(SampleEncoding::F32, 2).peak(), 0.0);
    }
}
