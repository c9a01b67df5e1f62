use std::io::Write;

use crate::config::DetectorConfig;
use crate::constants::AUDIO_SAMPLE_RATE;
use crate::inference::PitchModel;
use crate::postprocessing::events::CompletedNote;
use crate::session::AudioSession;

/// Size of the fragments the recording is cut into, mimicking a browser
/// audio worklet.
const FRAGMENT_SIZE: usize = 512;

/// Stream a recording through one session as if it arrived live.
///
/// Time advances by one hop duration per processed hop. Every outbound
/// message is written to `out` as one JSON line.
///
/// # Returns
///
/// * The session's completed notes, with notes still sounding at the end
///   closed at the final timestamp.
pub fn replay_samples<W: Write>(
    samples: &[f32],
    config: &DetectorConfig,
    model: &dyn PitchModel,
    out: &mut W,
) -> anyhow::Result<Vec<CompletedNote>> {
    let hop_seconds = config.hop_seconds(AUDIO_SAMPLE_RATE);
    let mut session = AudioSession::new(config.clone());
    let mut hops = 0u64;

    for fragment in samples.chunks(FRAGMENT_SIZE) {
        session.push_samples(fragment);

        while let Some(hop) = session.take_hop() {
            hops += 1;
            let now = hops as f64 * hop_seconds;
            for message in session.process_hop_with(&hop, model, now) {
                serde_json::to_writer(&mut *out, &message)?;
                writeln!(out)?;
            }
        }
    }

    Ok(session.finish(hops as f64 * hop_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::testing::fixed;

    #[test]
    fn test_replay_times_follow_sample_clock() {
        let config = DetectorConfig {
            hop_size: 2205,
            window_length: 4410,
            ..DetectorConfig::default()
        };

        // Half a second of tone, then half a second of silence
        let mut samples: Vec<f32> = (0..11025).map(|i| if i % 2 == 0 { 0.3 } else { -0.3 }).collect();
        samples.extend(std::iter::repeat(0.0).take(11025));

        let mut out = Vec::new();
        let notes = replay_samples(&samples, &config, &fixed(&[(60, 0.9)], &[]), &mut out).unwrap();

        // Onset on hop 1 (t = 0.1s), flushed on hop 6 (t = 0.6s)
        assert_eq!(notes, vec![CompletedNote::new(60, 0.0, 0.5)]);

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        let volumes = lines.iter().filter(|l| l["type"] == "volume").count();
        assert_eq!(volumes, 10);
        assert_eq!(lines.iter().filter(|l| l["type"] == "silence_reset").count(), 1);
    }
}
