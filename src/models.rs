// Core data models for the mood overlay

use crate::error::{OverlayError, Result};
use std::str::FromStr;

/// Represents a single video frame with RGB data
#[derive(Clone, Debug)]
pub struct Frame {
    /// Raw RGB pixel data (width * height * 3 bytes)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Creates a new Frame with the given parameters
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width as f32, self.height as f32)
    }
}

/// Width and height in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
}

impl Dimensions {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, e.g. a video that is not laid out yet
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// The closed set of expressions the classifier reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Emotion {
    Angry,
    Disgusted,
    Fearful,
    Happy,
    Neutral,
    Sad,
    Surprised,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgusted,
        Emotion::Fearful,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprised,
    ];

    /// Canonical key as reported by expression classifiers
    pub fn key(self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgusted => "disgusted",
            Emotion::Fearful => "fearful",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprised => "surprised",
        }
    }

    /// Display metadata for this emotion
    pub fn definition(self) -> &'static EmotionDefinition {
        // EMOTIONS is laid out in the same order as the enum
        &EMOTIONS[self as usize]
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Emotion {
    type Err = OverlayError;

    fn from_str(key: &str) -> Result<Self> {
        Emotion::ALL
            .into_iter()
            .find(|emotion| emotion.key() == key)
            .ok_or_else(|| OverlayError::UnknownEmotion(key.to_string()))
    }
}

/// A named display color
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub name: &'static str,
    pub rgb: [u8; 3],
}

impl Color {
    pub const RED: Color = Color::named("red", [255, 0, 0]);
    pub const GREEN: Color = Color::named("green", [0, 128, 0]);
    pub const PURPLE: Color = Color::named("purple", [128, 0, 128]);
    pub const YELLOW: Color = Color::named("yellow", [255, 255, 0]);
    pub const GRAY: Color = Color::named("gray", [128, 128, 128]);
    pub const ORANGE: Color = Color::named("orange", [255, 165, 0]);
    pub const WHITE: Color = Color::named("white", [255, 255, 255]);
    pub const BLACK: Color = Color::named("black", [0, 0, 0]);

    const fn named(name: &'static str, rgb: [u8; 3]) -> Self {
        Self { name, rgb }
    }
}

/// Display metadata for one emotion
#[derive(Debug, PartialEq, Eq)]
pub struct EmotionDefinition {
    pub emotion: Emotion,
    /// Canonical key, same as `Emotion::key`
    pub key: &'static str,
    /// Text drawn in the box label
    pub label: &'static str,
    /// Box and label background color
    pub color: Color,
    /// Label text color
    pub font_color: Color,
    pub emoji: &'static str,
}

/// Fixed emotion table, one entry per `Emotion` in declaration order
pub static EMOTIONS: [EmotionDefinition; 7] = [
    EmotionDefinition {
        emotion: Emotion::Angry,
        key: "angry",
        label: "Angry",
        color: Color::RED,
        font_color: Color::WHITE,
        emoji: "😡",
    },
    EmotionDefinition {
        emotion: Emotion::Disgusted,
        key: "disgusted",
        label: "Disgusted",
        color: Color::GREEN,
        font_color: Color::WHITE,
        emoji: "🤢",
    },
    EmotionDefinition {
        emotion: Emotion::Fearful,
        key: "fearful",
        label: "Fear",
        color: Color::PURPLE,
        font_color: Color::WHITE,
        emoji: "😱",
    },
    EmotionDefinition {
        emotion: Emotion::Happy,
        key: "happy",
        label: "Happy",
        color: Color::YELLOW,
        font_color: Color::BLACK,
        emoji: "😄",
    },
    EmotionDefinition {
        emotion: Emotion::Neutral,
        key: "neutral",
        label: "Neutral",
        color: Color::GRAY,
        font_color: Color::WHITE,
        emoji: "😐",
    },
    EmotionDefinition {
        emotion: Emotion::Sad,
        key: "sad",
        label: "Sad",
        color: Color::RED,
        font_color: Color::WHITE,
        emoji: "😢",
    },
    EmotionDefinition {
        emotion: Emotion::Surprised,
        key: "surprised",
        label: "Surprised",
        color: Color::ORANGE,
        font_color: Color::BLACK,
        emoji: "😲",
    },
];

/// Emotion -> confidence, iterated in the order the classifier produced it
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionScores {
    entries: Vec<(Emotion, f32)>,
}

impl ExpressionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a score. An emotion already present keeps its position.
    pub fn insert(&mut self, emotion: Emotion, score: f32) {
        match self.entries.iter_mut().find(|(e, _)| *e == emotion) {
            Some(entry) => entry.1 = score,
            None => self.entries.push((emotion, score)),
        }
    }

    pub fn get(&self, emotion: Emotion) -> Option<f32> {
        self.entries
            .iter()
            .find(|(e, _)| *e == emotion)
            .map(|(_, score)| *score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds scores from string-keyed pairs, rejecting unknown keys
    pub fn from_keyed<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let mut scores = Self::new();
        for (key, score) in pairs {
            scores.insert(key.parse()?, score);
        }
        Ok(scores)
    }
}

impl FromIterator<(Emotion, f32)> for ExpressionScores {
    fn from_iter<T: IntoIterator<Item = (Emotion, f32)>>(iter: T) -> Self {
        let mut scores = Self::new();
        for (emotion, score) in iter {
            scores.insert(emotion, score);
        }
        scores
    }
}

/// Face bounding box in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A single face with its expression scores
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub face: FaceBox,
    /// Face detector confidence (0.0 to 1.0)
    pub score: f32,
    pub expressions: ExpressionScores,
    /// Size of the image the box coordinates refer to
    pub image_dims: Dimensions,
}

impl Detection {
    /// Rescales the face box into `target` coordinates.
    /// An empty source size leaves the detection untouched.
    pub fn resized(&self, target: Dimensions) -> Detection {
        if self.image_dims.is_empty() {
            return self.clone();
        }

        let sx = target.width / self.image_dims.width;
        let sy = target.height / self.image_dims.height;

        Detection {
            face: FaceBox {
                x: self.face.x * sx,
                y: self.face.y * sy,
                width: self.face.width * sx,
                height: self.face.height * sy,
            },
            score: self.score,
            expressions: self.expressions.clone(),
            image_dims: target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_enum_order() {
        for emotion in Emotion::ALL {
            let def = emotion.definition();
            assert_eq!(def.emotion, emotion);
            assert_eq!(def.key, emotion.key());
        }
    }

    #[test]
    fn parses_known_keys_and_rejects_unknown() {
        assert_eq!("fearful".parse::<Emotion>().unwrap(), Emotion::Fearful);
        assert!(matches!(
            "contempt".parse::<Emotion>(),
            Err(OverlayError::UnknownEmotion(key)) if key == "contempt"
        ));
    }

    #[test]
    fn insert_keeps_first_position() {
        let mut scores = ExpressionScores::new();
        scores.insert(Emotion::Sad, 0.1);
        scores.insert(Emotion::Happy, 0.2);
        scores.insert(Emotion::Sad, 0.7);

        let order: Vec<_> = scores.iter().collect();
        assert_eq!(order, vec![(Emotion::Sad, 0.7), (Emotion::Happy, 0.2)]);
    }

    #[test]
    fn from_keyed_fails_on_unknown_key() {
        let result = ExpressionScores::from_keyed([("happy", 0.5), ("bored", 0.5)]);
        assert!(matches!(result, Err(OverlayError::UnknownEmotion(_))));
    }

    #[test]
    fn resize_scales_box_to_display_size() {
        let detection = Detection {
            face: FaceBox::new(64.0, 48.0, 128.0, 96.0),
            score: 0.9,
            expressions: ExpressionScores::new(),
            image_dims: Dimensions::new(640.0, 480.0),
        };

        let resized = detection.resized(Dimensions::new(320.0, 240.0));
        assert_eq!(resized.face, FaceBox::new(32.0, 24.0, 64.0, 48.0));
        assert_eq!(resized.image_dims, Dimensions::new(320.0, 240.0));
    }

    #[test]
    fn resize_with_unknown_source_size_is_identity() {
        let detection = Detection {
            face: FaceBox::new(1.0, 2.0, 3.0, 4.0),
            score: 0.5,
            expressions: ExpressionScores::new(),
            image_dims: Dimensions::default(),
        };
        assert_eq!(detection.resized(Dimensions::new(10.0, 10.0)), detection);
    }
}
