// Copyright (C) 2022-2024 Bridgeworks Developers.
//
// Bridgeworks is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Bridgeworks is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should receive a copy of the GNU General Public License
// If not, see <http://www.gnu.org/licenses/>.

//! Retry policies for async calls

use std::time::Duration;

use backoff::backoff::Backoff;

/// A backoff policy with a fixed pause between attempts and a hard cap on
/// how many retries are handed out before giving up.
///
/// Used for the startup probes (gateway chain id, signer node liveness)
/// where exponential growth would only delay the inevitable error.
#[derive(Debug, Clone)]
pub struct ConstantWithMaxRetryCount {
    interval: Duration,
    remaining: usize,
    max_retry_count: usize,
}

impl ConstantWithMaxRetryCount {
    /// A policy that pauses `interval` between attempts and allows up to
    /// `max_retry_count` retries after the initial attempt.
    pub fn new(interval: Duration, max_retry_count: usize) -> Self {
        Self {
            interval,
            remaining: max_retry_count,
            max_retry_count,
        }
    }
}

impl Backoff for ConstantWithMaxRetryCount {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.interval)
    }

    fn reset(&mut self) {
        self.remaining = self.max_retry_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_exactly_max_retry_count_pauses() {
        let interval = Duration::from_millis(250);
        let mut policy = ConstantWithMaxRetryCount::new(interval, 3);
        for _ in 0..3 {
            assert_eq!(policy.next_backoff(), Some(interval));
        }
        assert_eq!(policy.next_backoff(), None);
        policy.reset();
        assert_eq!(policy.next_backoff(), Some(interval));
    }
}
