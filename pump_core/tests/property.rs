use proptest::prelude::*;
use pump_core::{CurrentSensing, ModeArbiter, SensorReader, TemperatureSensing};
use pump_traits::{BoxError, CurrentSensor, ManualClock, PumpId};

struct Replay {
    raws: Vec<u16>,
    idx: usize,
}

impl CurrentSensor for Replay {
    fn read_raw_sample(&mut self) -> Result<u16, BoxError> {
        let raw = self
            .raws
            .get(self.idx)
            .copied()
            .ok_or("window overran the recorded samples")?;
        self.idx += 1;
        Ok(raw)
    }
}

fn rising_edges(levels: &[bool]) -> u64 {
    let mut prev = false;
    let mut n = 0;
    for &l in levels {
        if l && !prev {
            n += 1;
        }
        prev = l;
    }
    n
}

proptest! {
    #[test]
    fn window_peak_is_the_true_maximum(amps in prop::collection::vec(-20.0f32..40.0, 1..200)) {
        let sensing = CurrentSensing {
            samples: amps.len() as u32,
            sample_interval_ms: 0,
            ..CurrentSensing::default()
        };
        let raws: Vec<u16> = amps.iter().map(|a| sensing.to_raw(*a)).collect();
        let expected = raws
            .iter()
            .map(|r| sensing.to_amps(*r))
            .fold(f32::NEG_INFINITY, f32::max);

        let reader = SensorReader::new(sensing, TemperatureSensing::default());
        let clock = ManualClock::new();
        let peak = reader
            .peak_current(&mut Replay { raws, idx: 0 }, &clock)
            .expect("replay covers the window");
        prop_assert_eq!(peak, expected);
    }

    #[test]
    fn cycle_count_is_the_number_of_rising_edges(levels in prop::collection::vec(any::<bool>(), 0..300)) {
        let mut arbiter = ModeArbiter::new();
        for &l in &levels {
            arbiter.observe_float(l);
        }
        let edges = rising_edges(&levels);
        prop_assert_eq!(arbiter.cycle_count(), edges);
        let expected = if edges % 2 == 0 { PumpId::One } else { PumpId::Two };
        prop_assert_eq!(arbiter.automatic_pump(), expected);
    }
}
