//! Simulated telemetry source
//!
//! Evolves a sample by small randomized deltas each tick. Stands in for the
//! push channel a real vehicle provides; tests and the demo binary also use
//! it to script link loss and battery drain.

use super::{TelemetrySample, TelemetrySource};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Mutex;

struct SimState {
    current: TelemetrySample,
    /// While true, `next_sample` yields nothing (simulated link dropout)
    muted: bool,
    ticks: u64,
    /// Battery percentage drained per 100 ticks of flight
    drain_per_100_ticks: u32,
}

/// Randomized-delta telemetry generator
pub struct SimulatedTelemetry {
    state: Mutex<SimState>,
}

impl SimulatedTelemetry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                current: TelemetrySample::grounded(),
                muted: false,
                ticks: 0,
                drain_per_100_ticks: 1,
            }),
        }
    }

    /// Replace the whole sample (tests script exact conditions this way)
    pub fn set_sample(&self, sample: TelemetrySample) {
        self.state.lock().unwrap().current = sample;
    }

    /// Suppress sample delivery to simulate a link dropout
    pub fn set_muted(&self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    /// Mark the vehicle as airborne so flight fields start evolving
    pub fn set_flying(&self, flying: bool) {
        let mut state = self.state.lock().unwrap();
        state.current.status.flying = flying;
        state.current.status.armed = flying;
        state.current.status.mode = if flying { "mission" } else { "standby" }.into();
    }

    pub fn set_drain_rate(&self, percent_per_100_ticks: u32) {
        self.state.lock().unwrap().drain_per_100_ticks = percent_per_100_ticks;
    }

    fn advance(state: &mut SimState) {
        let mut rng = rand::thread_rng();
        state.ticks += 1;
        let ticks = state.ticks;
        let drain_rate = state.drain_per_100_ticks;
        let sample = &mut state.current;

        sample.battery.voltage = (sample.battery.voltage + rng.gen_range(-0.02..0.02)).max(0.0);
        sample.gps.satellite_count = sample
            .gps
            .satellite_count
            .saturating_add_signed(rng.gen_range(-1..=1))
            .min(20);

        if sample.status.flying {
            sample.battery.current = 12.0 + rng.gen_range(-1.0..1.0);
            sample.battery.temperature_celsius += rng.gen_range(-0.05..0.15);
            sample.flight.speed_horizontal =
                (sample.flight.speed_horizontal + rng.gen_range(-0.5..0.5)).clamp(0.0, 15.0);
            sample.flight.speed_vertical =
                (sample.flight.speed_vertical + rng.gen_range(-0.3..0.3)).clamp(-4.0, 4.0);
            sample.flight.altitude_agl =
                (sample.flight.altitude_agl + sample.flight.speed_vertical * 0.1).max(0.0);
            sample.flight.distance_from_home =
                (sample.flight.distance_from_home + rng.gen_range(-1.0..2.0)).max(0.0);
            sample.flight.heading_degrees =
                (sample.flight.heading_degrees + rng.gen_range(-2.0..2.0)).rem_euclid(360.0);

            // 10 Hz cadence: one flight second per ten ticks
            if ticks % 10 == 0 {
                sample.flight.flight_time_seconds += 1;
            }
            if ticks % 100 == 0 {
                let drain = drain_rate.min(sample.battery.percentage as u32);
                sample.battery.percentage -= drain as u8;
            }
            if sample.camera.recording && ticks % 50 == 0 {
                sample.camera.photo_count += 1;
                sample.camera.sd_remaining_gb = (sample.camera.sd_remaining_gb - 0.02).max(0.0);
            }
        } else {
            sample.battery.current = 0.4;
            sample.flight.speed_horizontal = 0.0;
            sample.flight.speed_vertical = 0.0;
        }
    }
}

impl Default for SimulatedTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySource for SimulatedTelemetry {
    async fn next_sample(&self) -> Option<TelemetrySample> {
        let mut state = self.state.lock().unwrap();
        if state.muted {
            return None;
        }
        Self::advance(&mut state);
        Some(state.current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_muted_source_yields_nothing() {
        let sim = SimulatedTelemetry::new();
        sim.set_muted(true);
        assert!(sim.next_sample().await.is_none());
        sim.set_muted(false);
        assert!(sim.next_sample().await.is_some());
    }

    #[tokio::test]
    async fn test_flight_time_is_monotonic() {
        let sim = SimulatedTelemetry::new();
        sim.set_flying(true);

        let mut last = 0;
        for _ in 0..50 {
            let sample = sim.next_sample().await.unwrap();
            assert!(sample.flight.flight_time_seconds >= last);
            last = sample.flight.flight_time_seconds;
        }
    }

    #[tokio::test]
    async fn test_grounded_vehicle_does_not_move() {
        let sim = SimulatedTelemetry::new();
        for _ in 0..20 {
            let sample = sim.next_sample().await.unwrap();
            assert_eq!(sample.flight.speed_horizontal, 0.0);
            assert_eq!(sample.flight.speed_vertical, 0.0);
        }
    }

    #[tokio::test]
    async fn test_battery_drains_while_flying() {
        let sim = SimulatedTelemetry::new();
        sim.set_flying(true);
        sim.set_drain_rate(5);

        let mut first = None;
        let mut last = 0;
        for _ in 0..300 {
            let sample = sim.next_sample().await.unwrap();
            first.get_or_insert(sample.battery.percentage);
            last = sample.battery.percentage;
        }
        assert!(last < first.unwrap());
    }
}
