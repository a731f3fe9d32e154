// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

const PREFIXES: [&str; 3] = ["detection", "detection", "motion"];
const EXTENSIONS: [&str; 3] = ["jpg", "jpg", "png"];
const LOOSE_NAMES: [&str; 6] = [
    "beach.png",
    "forest.png",
    "driveway-test.jpg",
    "porch.jpeg",
    "garage_door.png",
    "calibration.jpg",
];

// Smallest byte prefix image viewers recognise as a JPEG.
const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];
const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCapture {
    pub file_name: String,
    pub taken_at: OffsetDateTime,
}

/// Produces capture file names the way the detection service writes them.
#[derive(Debug, Clone)]
pub struct CaptureFaker {
    rng: DeterministicRng,
    next_id: i64,
}

impl CaptureFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_id: 1,
        }
    }

    /// A detection capture taken up to `max_age` before `now`. Roughly half of
    /// them use the service's weekday form, the rest an ISO date.
    pub fn detection(&mut self, now: OffsetDateTime, max_age: Duration) -> FakeCapture {
        let span = max_age.whole_seconds().max(1) as u64;
        let age = Duration::seconds((self.rng.next_u64() % span) as i64);
        let taken_at = now - age;

        let id = self.next_id;
        self.next_id += 1;
        let prefix = self.pick(&PREFIXES);
        let extension = self.pick(&EXTENSIONS);
        let file_name = if self.rng.bool() {
            format!(
                "{prefix}_{id}_{}_{}.{extension}",
                service_date(taken_at),
                service_time(taken_at)
            )
        } else {
            format!(
                "{prefix}_{id}_{}_{}.{extension}",
                iso_date(taken_at),
                service_time(taken_at)
            )
        };

        FakeCapture {
            file_name,
            taken_at,
        }
    }

    pub fn loose_name(&mut self) -> &'static str {
        self.pick(&LOOSE_NAMES)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

pub fn service_date(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[weekday repr:short]-[month repr:short]-[year]"
    ))
    .unwrap_or_default()
}

pub fn service_time(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[hour repr:12]-[minute]-[second][period]"
    ))
    .unwrap_or_default()
}

pub fn iso_date(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

pub fn temp_captures_dir() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let captures = dir.path().join("captures");
    fs::create_dir_all(&captures)
        .with_context(|| format!("create captures dir {}", captures.display()))?;
    Ok((dir, captures))
}

/// Writes a placeholder image whose header matches its extension.
pub fn write_capture(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let bytes: &[u8] = if file_name.to_ascii_lowercase().ends_with(".png") {
        &PNG_MAGIC
    } else {
        &JPEG_MAGIC
    };
    fs::write(&path, bytes).with_context(|| format!("write capture {}", path.display()))?;
    Ok(path)
}

pub fn set_modified(path: &Path, modified: OffsetDateTime) -> Result<()> {
    let file = fs::File::options()
        .write(true)
        .open(path)
        .with_context(|| format!("open {} to set mtime", path.display()))?;
    file.set_modified(SystemTime::from(modified))
        .with_context(|| format!("set mtime on {}", path.display()))
}

/// Fills `dir` with `count` detection captures plus a couple of hand-named
/// images, each file's mtime matching when it was "taken".
pub fn seed_captures(
    dir: &Path,
    seed: u64,
    count: usize,
    now: OffsetDateTime,
) -> Result<Vec<String>> {
    let mut faker = CaptureFaker::new(seed);
    let mut written = Vec::with_capacity(count + 2);

    for _ in 0..count {
        let capture = faker.detection(now, Duration::days(14));
        let path = write_capture(dir, &capture.file_name)?;
        set_modified(&path, capture.taken_at)?;
        written.push(capture.file_name);
    }

    for _ in 0..2 {
        let name = faker.loose_name();
        if written.iter().any(|existing| existing == name) {
            continue;
        }
        let path = write_capture(dir, name)?;
        set_modified(&path, now - Duration::days(30))?;
        written.push(name.to_owned());
    }

    Ok(written)
}

pub fn fixture_now() -> OffsetDateTime {
    time::macros::datetime!(2026-02-19 12:34:56 UTC)
}
