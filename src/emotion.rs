// Dominant-emotion selection and display metadata lookup

use crate::models::{Emotion, EmotionDefinition, ExpressionScores};

/// Picks the highest-scoring emotion.
///
/// Entries are scanned in iteration order against a running maximum that
/// starts at 0. An entry only takes over when its score is strictly greater,
/// so ties keep the earlier entry and a mapping whose scores are all <= 0
/// (or NaN) has no dominant emotion.
pub fn dominant_emotion(scores: &ExpressionScores) -> Option<(Emotion, f32)> {
    let mut max = 0.0f32;
    let mut best = None;

    for (emotion, score) in scores.iter() {
        if score > max {
            max = score;
            best = Some((emotion, score));
        }
    }

    best
}

/// Resolves the display metadata for the dominant emotion, if any
pub fn resolve(scores: &ExpressionScores) -> Option<&'static EmotionDefinition> {
    dominant_emotion(scores).map(|(emotion, _)| emotion.definition())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Color;

    fn scores(pairs: &[(Emotion, f32)]) -> ExpressionScores {
        pairs.iter().copied().collect()
    }

    #[test]
    fn non_positive_scores_have_no_dominant_emotion() {
        assert_eq!(dominant_emotion(&ExpressionScores::new()), None);
        assert_eq!(
            dominant_emotion(&scores(&[(Emotion::Happy, 0.0), (Emotion::Sad, -0.3)])),
            None
        );
        assert_eq!(
            dominant_emotion(&scores(&[(Emotion::Neutral, f32::NAN)])),
            None
        );
    }

    #[test]
    fn unique_maximum_wins_in_any_order() {
        let pairs = [
            (Emotion::Neutral, 0.05),
            (Emotion::Surprised, 0.7),
            (Emotion::Angry, 0.15),
            (Emotion::Fearful, 0.1),
        ];

        for rotation in 0..pairs.len() {
            let mut rotated = pairs;
            rotated.rotate_left(rotation);
            let reversed: Vec<_> = rotated.iter().rev().copied().collect();

            assert_eq!(
                dominant_emotion(&scores(&rotated)).map(|(e, _)| e),
                Some(Emotion::Surprised)
            );
            assert_eq!(
                dominant_emotion(&scores(&reversed)).map(|(e, _)| e),
                Some(Emotion::Surprised)
            );
        }
    }

    #[test]
    fn tie_keeps_first_seen() {
        let tied = ExpressionScores::from_keyed([("angry", 0.4), ("disgusted", 0.4)]).unwrap();
        assert_eq!(dominant_emotion(&tied), Some((Emotion::Angry, 0.4)));

        let flipped = ExpressionScores::from_keyed([("disgusted", 0.4), ("angry", 0.4)]).unwrap();
        assert_eq!(dominant_emotion(&flipped), Some((Emotion::Disgusted, 0.4)));
    }

    #[test]
    fn happy_resolves_to_yellow_box_with_black_text() {
        let happy = ExpressionScores::from_keyed([("happy", 0.9), ("sad", 0.1)]).unwrap();
        let def = resolve(&happy).unwrap();

        assert_eq!(def.label, "Happy");
        assert_eq!(def.color, Color::YELLOW);
        assert_eq!(def.font_color, Color::BLACK);
    }

    #[test]
    fn resolve_without_dominant_is_none() {
        assert!(resolve(&scores(&[(Emotion::Sad, 0.0)])).is_none());
    }
}
