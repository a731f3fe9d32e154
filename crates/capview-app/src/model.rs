// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::ids::DetectionId;

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest first",
            Self::Oldest => "Oldest first",
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Newest => Self::Oldest,
            Self::Oldest => Self::Newest,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "newest" => Some(Self::Newest),
            "oldest" => Some(Self::Oldest),
            _ => None,
        }
    }
}

/// Parsed form of a capture file name.
///
/// The detection service writes `{prefix}_{id}_{date}_{time}.{ext}`. Only the
/// extension is required; everything else is best effort so that hand-copied
/// images still show up in the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureName {
    pub file_name: String,
    pub stem: String,
    pub extension: String,
    pub detection_id: Option<DetectionId>,
    pub date_raw: Option<String>,
    pub time_raw: Option<String>,
    pub captured_on: Option<Date>,
    pub captured_at: Option<PrimitiveDateTime>,
}

impl CaptureName {
    pub fn parse(file_name: &str) -> Option<Self> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        let extension = extension.to_ascii_lowercase();
        if stem.is_empty() || !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return None;
        }

        let mut name = Self {
            file_name: file_name.to_owned(),
            stem: stem.to_owned(),
            extension,
            detection_id: None,
            date_raw: None,
            time_raw: None,
            captured_on: None,
            captured_at: None,
        };

        let parts = stem.split('_').collect::<Vec<_>>();
        if let [_prefix, id, date, clock] = parts.as_slice() {
            name.detection_id = id.parse::<i64>().ok().map(DetectionId::new);
            name.date_raw = Some((*date).to_owned());
            name.time_raw = Some((*clock).to_owned());
            name.captured_on = parse_capture_date(date);
            name.captured_at = name
                .captured_on
                .zip(parse_capture_time(clock))
                .map(|(date, clock)| PrimitiveDateTime::new(date, clock));
        }

        Some(name)
    }
}

fn parse_capture_date(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
}

fn parse_capture_time(raw: &str) -> Option<Time> {
    Time::parse(
        raw,
        format_description!("[hour repr:12]-[minute]-[second][period case_sensitive:false]"),
    )
    .or_else(|_| Time::parse(raw, format_description!("[hour]-[minute]-[second]")))
    .ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub name: CaptureName,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Expressed in the camera's local offset, the same clock the file name
    /// uses.
    pub modified: Option<OffsetDateTime>,
}

impl Capture {
    /// Builds a capture from a path alone; file metadata is left empty.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let name = CaptureName::parse(file_name)?;
        Some(Self {
            name,
            path: path.to_path_buf(),
            size_bytes: 0,
            modified: None,
        })
    }

    pub fn label(&self) -> &str {
        &self.name.file_name
    }

    pub fn file_name(&self) -> &str {
        &self.name.file_name
    }

    pub fn timestamp(&self) -> Option<PrimitiveDateTime> {
        self.name.captured_at.or_else(|| {
            self.modified
                .map(|modified| PrimitiveDateTime::new(modified.date(), modified.time()))
        })
    }

    pub fn captured_on(&self) -> Option<Date> {
        self.name.captured_on
    }

    fn raw_key(&self) -> (&str, &str, &str) {
        (
            self.name.date_raw.as_deref().unwrap_or(""),
            self.name.time_raw.as_deref().unwrap_or(""),
            self.file_name(),
        )
    }
}

/// Chronological comparison honoring `order`. Captures without any timestamp
/// always sort after the ones that have one.
pub fn compare_captures(left: &Capture, right: &Capture, order: SortOrder) -> Ordering {
    let ordering = match (left.timestamp(), right.timestamp()) {
        (Some(a), Some(b)) => a
            .cmp(&b)
            .then_with(|| left.file_name().cmp(right.file_name())),
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (None, None) => left.raw_key().cmp(&right.raw_key()),
    };

    match order {
        SortOrder::Oldest => ordering,
        SortOrder::Newest => ordering.reverse(),
    }
}

pub fn sort_captures(captures: &mut [Capture], order: SortOrder) {
    captures.sort_by(|left, right| compare_captures(left, right, order));
}

/// What the detail pane renders: an image element pointing at `src`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailView {
    pub file_name: String,
    pub src: String,
}

#[cfg(test)]
mod tests {
    use super::{Capture, CaptureName, SortOrder, sort_captures};
    use crate::DetectionId;
    use std::path::Path;
    use time::macros::{date, datetime};

    fn capture(file_name: &str) -> Capture {
        Capture::from_path(Path::new(file_name)).expect("image file name")
    }

    #[test]
    fn parse_reads_service_naming() {
        let name = CaptureName::parse("detection_3_Mon-Jan-2026_09-15-02PM.jpg")
            .expect("image extension");
        assert_eq!(name.stem, "detection_3_Mon-Jan-2026_09-15-02PM");
        assert_eq!(name.extension, "jpg");
        assert_eq!(name.detection_id, Some(DetectionId::new(3)));
        assert_eq!(name.date_raw.as_deref(), Some("Mon-Jan-2026"));
        assert_eq!(name.time_raw.as_deref(), Some("09-15-02PM"));
        assert_eq!(name.captured_on, None);
        assert_eq!(name.captured_at, None);
    }

    #[test]
    fn parse_builds_timestamp_from_iso_date() {
        let name = CaptureName::parse("detection_12_2026-03-04_01-02-03PM.png")
            .expect("image extension");
        assert_eq!(name.captured_on, Some(date!(2026 - 03 - 04)));
        assert_eq!(name.captured_at, Some(datetime!(2026-03-04 13:02:03)));

        let name = CaptureName::parse("detection_12_2026-03-04_23-02-03.jpeg")
            .expect("image extension");
        assert_eq!(name.captured_at, Some(datetime!(2026-03-04 23:02:03)));
    }

    #[test]
    fn parse_rejects_non_image_extensions() {
        assert!(CaptureName::parse("notes.txt").is_none());
        assert!(CaptureName::parse("no_extension").is_none());
        assert!(CaptureName::parse(".png").is_none());
        assert!(CaptureName::parse("BEACH.PNG").is_some());
    }

    #[test]
    fn parse_keeps_free_form_names() {
        let name = CaptureName::parse("beach.png").expect("image extension");
        assert_eq!(name.detection_id, None);
        assert_eq!(name.date_raw, None);
        assert_eq!(name.captured_at, None);
    }

    #[test]
    fn sort_orders_timestamped_before_untimestamped() {
        let mut captures = vec![
            capture("beach.png"),
            capture("detection_1_2026-01-01_08-00-00.jpg"),
            capture("detection_2_2026-01-02_08-00-00.jpg"),
            capture("alpha.png"),
        ];

        sort_captures(&mut captures, SortOrder::Newest);
        let names = captures.iter().map(Capture::file_name).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "detection_2_2026-01-02_08-00-00.jpg",
                "detection_1_2026-01-01_08-00-00.jpg",
                "beach.png",
                "alpha.png",
            ]
        );

        sort_captures(&mut captures, SortOrder::Oldest);
        let names = captures.iter().map(Capture::file_name).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "detection_1_2026-01-01_08-00-00.jpg",
                "detection_2_2026-01-02_08-00-00.jpg",
                "alpha.png",
                "beach.png",
            ]
        );
    }

    #[test]
    fn mtime_fallback_uses_the_offset_it_carries() {
        let named = capture("detection_1_2026-02-19_10-00-00AM.jpg");
        let mut service = capture("detection_2_Thu-Feb-2026_10-30-00AM.jpg");
        service.modified = Some(datetime!(2026-02-19 10:30 +1));
        assert_eq!(service.timestamp(), Some(datetime!(2026-02-19 10:30)));

        let mut captures = vec![named, service];
        sort_captures(&mut captures, SortOrder::Newest);
        assert_eq!(
            captures.iter().map(Capture::file_name).collect::<Vec<_>>(),
            vec![
                "detection_2_Thu-Feb-2026_10-30-00AM.jpg",
                "detection_1_2026-02-19_10-00-00AM.jpg",
            ]
        );
    }

    #[test]
    fn sort_order_round_trips_through_labels() {
        assert_eq!(SortOrder::default(), SortOrder::Newest);
        assert_eq!(SortOrder::Newest.toggled(), SortOrder::Oldest);
        assert_eq!(SortOrder::Oldest.toggled(), SortOrder::Newest);
        assert_eq!(SortOrder::parse("oldest"), Some(SortOrder::Oldest));
        assert_eq!(SortOrder::parse("sideways"), None);
    }
}
