use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a practice session orders the deck's images.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShuffleMode {
    /// Keep deck order.
    Off,
    Uniform,
    /// Harder images tend to come first: weight is difficulty squared.
    #[default]
    Weighted,
}

/// Which images a session draws from the deck and in what order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DeckFilter {
    /// When non-empty, tagged images must carry at least one of these.
    /// Untagged images are always included.
    pub enabled_tags: BTreeSet<String>,
    pub shuffle: ShuffleMode,
    /// Exclude images above this difficulty.
    pub max_difficulty: Option<u8>,
}

/// Longest tag kept, in characters.
pub const MAX_TAG_LEN: usize = 24;

/// Clean user-entered tags: `#` separates tags, surrounding whitespace and
/// empty pieces are dropped, and each tag is cut to [`MAX_TAG_LEN`] characters.
pub fn normalize_tags<I, T>(raw: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    raw.into_iter()
        .flat_map(|entry| {
            entry
                .as_ref()
                .split('#')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(|tag| tag.chars().take(MAX_TAG_LEN).collect::<String>())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn default_difficulty() -> u8 {
    1
}

/// A reference image inside a deck.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeckImage {
    /// Unique within a deck.
    pub filename: String,
    #[serde(default)]
    pub original_path: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Size of the source file in bytes.
    #[serde(default)]
    pub size: u64,
    /// Base64 image bytes, present when the deck carries its own copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl DeckImage {
    pub fn new(filename: impl Into<String>, original_path: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            original_path: original_path.into(),
            width: 0,
            height: 0,
            size: 0,
            image_data: None,
            difficulty: default_difficulty(),
            tags: BTreeSet::new(),
        }
    }

    /// Embed a copy of the image bytes; `size` follows the embedded payload.
    pub fn embed(&mut self, bytes: &[u8]) {
        self.size = bytes.len() as u64;
        self.image_data = Some(BASE64.encode(bytes));
    }

    /// Decode the embedded copy, if any.
    pub fn embedded_bytes(&self) -> Result<Option<Vec<u8>>, base64::DecodeError> {
        self.image_data
            .as_deref()
            .map(|data| BASE64.decode(data))
            .transpose()
    }

    fn passes(&self, filter: &DeckFilter) -> bool {
        if filter
            .max_difficulty
            .is_some_and(|max| self.difficulty > max)
        {
            return false;
        }
        self.tags.is_empty()
            || filter.enabled_tags.is_empty()
            || !self.tags.is_disjoint(&filter.enabled_tags)
    }

    fn weight(&self) -> f64 {
        let d = f64::from(self.difficulty.max(1));
        d * d
    }
}

/// A named, configured collection of reference images. Persisted one file per deck.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deck {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub images: Vec<DeckImage>,
    #[serde(default)]
    pub filter: DeckFilter,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Deck {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            images: Vec::new(),
            filter: DeckFilter::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn image(&self, filename: &str) -> Option<&DeckImage> {
        self.images.iter().find(|img| img.filename == filename)
    }

    /// Append an image. Returns false (and leaves the deck untouched) when an
    /// image with the same filename is already present.
    pub fn add_image(&mut self, image: DeckImage) -> bool {
        if self.image(&image.filename).is_some() {
            return false;
        }
        self.images.push(image);
        self.touch();
        true
    }

    pub fn remove_image(&mut self, filename: &str) -> Option<DeckImage> {
        let idx = self.images.iter().position(|img| img.filename == filename)?;
        let removed = self.images.remove(idx);
        self.touch();
        Some(removed)
    }

    /// Replace an image's tags. Returns false when no such image exists.
    pub fn set_tags(&mut self, filename: &str, tags: BTreeSet<String>) -> bool {
        let Some(image) = self.images.iter_mut().find(|img| img.filename == filename) else {
            return false;
        };
        image.tags = tags;
        self.touch();
        true
    }

    /// Every tag used by any image.
    pub fn tags(&self) -> BTreeSet<String> {
        self.images
            .iter()
            .flat_map(|img| img.tags.iter().cloned())
            .collect()
    }

    /// Images for one practice session: filtered, then ordered per `filter.shuffle`.
    pub fn session_images<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<&DeckImage> {
        let mut picked: Vec<&DeckImage> = self
            .images
            .iter()
            .filter(|img| img.passes(&self.filter))
            .collect();

        match self.filter.shuffle {
            ShuffleMode::Off => {}
            ShuffleMode::Uniform => {
                use rand::seq::SliceRandom;
                picked.shuffle(rng);
            }
            ShuffleMode::Weighted => {
                // Weighted sampling without replacement: sort by u^(1/w) descending.
                let mut keyed: Vec<(f64, &DeckImage)> = picked
                    .into_iter()
                    .map(|img| (rng.gen::<f64>().powf(1.0 / img.weight()), img))
                    .collect();
                keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
                picked = keyed.into_iter().map(|(_, img)| img).collect();
            }
        }
        picked
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn tagged(name: &str, tags: &[&str], difficulty: u8) -> DeckImage {
        let mut img = DeckImage::new(name, format!("/refs/{name}"));
        img.tags = tags.iter().map(|t| t.to_string()).collect();
        img.difficulty = difficulty;
        img
    }

    #[test]
    fn duplicate_filenames_are_ignored() {
        let mut deck = Deck::new("Gesture");
        assert!(deck.add_image(DeckImage::new("a.png", "/x/a.png")));
        assert!(!deck.add_image(DeckImage::new("a.png", "/y/a.png")));
        assert_eq!(deck.images.len(), 1);
        assert_eq!(deck.images[0].original_path, "/x/a.png");
    }

    #[test]
    fn remove_and_retag() {
        let mut deck = Deck::new("Hands");
        deck.add_image(DeckImage::new("a.png", ""));
        deck.add_image(DeckImage::new("b.png", ""));

        assert!(deck.set_tags("b.png", BTreeSet::from(["hands".to_string()])));
        assert!(!deck.set_tags("missing.png", BTreeSet::new()));
        assert_eq!(deck.tags(), BTreeSet::from(["hands".to_string()]));

        let removed = deck.remove_image("a.png").expect("removed");
        assert_eq!(removed.filename, "a.png");
        assert!(deck.remove_image("a.png").is_none());
    }

    #[test]
    fn embedded_bytes_round_trip() {
        let mut img = DeckImage::new("a.png", "");
        assert_eq!(img.embedded_bytes().expect("decode"), None);
        img.embed(&[0x89, b'P', b'N', b'G']);
        assert_eq!(img.size, 4);
        assert_eq!(
            img.embedded_bytes().expect("decode"),
            Some(vec![0x89, b'P', b'N', b'G'])
        );
    }

    #[test]
    fn tag_filter_keeps_untagged_and_matching_images() {
        let mut deck = Deck::new("Mixed");
        deck.add_image(tagged("plain.png", &[], 1));
        deck.add_image(tagged("hand.png", &["hands"], 1));
        deck.add_image(tagged("foot.png", &["feet"], 1));
        deck.filter.shuffle = ShuffleMode::Off;
        deck.filter.enabled_tags = BTreeSet::from(["hands".to_string()]);

        let mut rng = StdRng::seed_from_u64(7);
        let names: Vec<_> = deck
            .session_images(&mut rng)
            .iter()
            .map(|img| img.filename.as_str())
            .collect();
        assert_eq!(names, vec!["plain.png", "hand.png"]);
    }

    #[test]
    fn difficulty_cap_excludes_harder_images() {
        let mut deck = Deck::new("Capped");
        deck.add_image(tagged("easy.png", &[], 1));
        deck.add_image(tagged("hard.png", &[], 5));
        deck.filter.max_difficulty = Some(3);

        let mut rng = StdRng::seed_from_u64(1);
        let picked = deck.session_images(&mut rng);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].filename, "easy.png");
    }

    #[test]
    fn weighted_shuffle_keeps_every_image_once() {
        let mut deck = Deck::new("Shuffled");
        for i in 0..20 {
            deck.add_image(tagged(&format!("{i}.png"), &[], (i % 5 + 1) as u8));
        }
        let mut rng = StdRng::seed_from_u64(42);
        let mut names: Vec<_> = deck
            .session_images(&mut rng)
            .iter()
            .map(|img| img.filename.clone())
            .collect();
        names.sort();
        let mut expected: Vec<_> = deck.images.iter().map(|i| i.filename.clone()).collect();
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn weighted_shuffle_favours_difficult_images() {
        let mut deck = Deck::new("Bias");
        deck.add_image(tagged("easy.png", &[], 1));
        deck.add_image(tagged("hard.png", &[], 5));

        let mut rng = StdRng::seed_from_u64(9);
        let hard_first = (0..1000)
            .filter(|_| deck.session_images(&mut rng)[0].filename == "hard.png")
            .count();
        // P(hard first) = 25 / 26.
        assert!(hard_first > 900, "hard first {hard_first} times");
    }

    #[test]
    fn legacy_image_entry_without_optional_fields_parses() {
        let json = r#"{ "filename": "a.png", "original_path": "/a.png" }"#;
        let img: DeckImage = serde_json::from_str(json).expect("parse");
        assert_eq!(img.difficulty, 1);
        assert!(img.tags.is_empty());
        assert_eq!(img.image_data, None);
    }

    #[test]
    fn tags_are_split_trimmed_and_capped() {
        let tags = normalize_tags([
            "#hands #feet",
            "  ",
            "##",
            " gesture ",
            "ａｂｃｄｅｆｇｈｉｊｋｌｍｎｏｐｑｒｓｔｕｖｗｘｙｚ",
        ]);
        assert_eq!(
            tags,
            BTreeSet::from([
                "hands".to_string(),
                "feet".to_string(),
                "gesture".to_string(),
                "ａｂｃｄｅｆｇｈｉｊｋｌｍｎｏｐｑｒｓｔｕｖｗｘ".to_string(),
            ])
        );
        assert!(normalize_tags(Vec::<String>::new()).is_empty());
    }
}
