//! File classification by extension.

use derive_more::Display;

const RAW_EXTENSIONS: [&str; 5] = ["dng", "nef", "cr2", "arw", "rw2"];
const JPEG_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];
const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mov", "avi", "mkv", "m4v", "wmv"];

/// What kind of media a file is, judged only by its extension.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    #[display("RAW image")]
    RawImage,
    #[display("JPEG")]
    AlreadyJpeg,
    #[display("video")]
    Video,
    /// Everything else, including PNG and WebP.
    #[display("other")]
    Other,
}
impl Category {
    /// Classify a file name (or path) by its extension, case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use mediamig_migrate::Category;
    ///
    /// assert_eq!(Category::from_name("IMG_0001.DNG"), Category::RawImage);
    /// assert_eq!(Category::from_name("holiday.Jpeg"), Category::AlreadyJpeg);
    /// assert_eq!(Category::from_name("screenshot.png"), Category::Other);
    /// assert_eq!(Category::from_name("README"), Category::Other);
    /// ```
    pub fn from_name(name: &str) -> Self {
        let Some(extension) = Self::extension(name) else {
            return Self::Other;
        };
        let extension = extension.as_str();
        if RAW_EXTENSIONS.contains(&extension) {
            Self::RawImage
        } else if JPEG_EXTENSIONS.contains(&extension) {
            Self::AlreadyJpeg
        } else if VIDEO_EXTENSIONS.contains(&extension) {
            Self::Video
        } else {
            Self::Other
        }
    }

    /// Lower-cased extension without the dot, or `None` when there is none.
    ///
    /// A leading dot does not start an extension (`.hidden` has none), and
    /// neither does a trailing one.
    pub fn extension(name: &str) -> Option<String> {
        split_extension(name).1.map(str::to_lowercase)
    }
}

/// Shorthand for [`Category::from_name`].
pub fn classify(name: &str) -> Category {
    Category::from_name(name)
}

/// Split a leaf name into stem and (non-empty) extension.
pub(crate) fn split_extension(name: &str) -> (&str, Option<&str>) {
    let leaf = name.rsplit('/').next().unwrap_or(name);
    match leaf.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, (!extension.is_empty()).then_some(extension)),
        _ => (leaf, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a.dng", Category::RawImage)]
    #[case("a.NEF", Category::RawImage)]
    #[case("a.Cr2", Category::RawImage)]
    #[case("a.arw", Category::RawImage)]
    #[case("a.rw2", Category::RawImage)]
    #[case("a.jpg", Category::AlreadyJpeg)]
    #[case("a.JPEG", Category::AlreadyJpeg)]
    #[case("a.mp4", Category::Video)]
    #[case("a.MOV", Category::Video)]
    #[case("a.avi", Category::Video)]
    #[case("a.mkv", Category::Video)]
    #[case("a.m4v", Category::Video)]
    #[case("a.wmv", Category::Video)]
    #[case("a.png", Category::Other)]
    #[case("a.webp", Category::Other)]
    #[case("a.heic", Category::Other)]
    #[case("a.tar.gz", Category::Other)]
    #[case("noextension", Category::Other)]
    #[case(".dng", Category::Other)]
    #[case("trailing.", Category::Other)]
    #[case("", Category::Other)]
    fn test_classify(#[case] name: &str, #[case] expected: Category) {
        assert_eq!(classify(name), expected);
    }

    #[rstest]
    #[case("IMG.DNG", "img.dng")]
    #[case("Clip.Mp4", "clip.MP4")]
    #[case("x.JPEG", "x.jpeg")]
    fn test_classify_ignores_case(#[case] a: &str, #[case] b: &str) {
        assert_eq!(classify(a), classify(b));
    }

    #[rstest]
    #[case("IMG_0001.DNG", Some("dng"))]
    #[case("archive.tar.GZ", Some("gz"))]
    #[case("/Camera Uploads/v1.2/clip", None)]
    #[case(".hidden", None)]
    #[case("trailing.", None)]
    fn test_extension(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(Category::extension(name).as_deref(), expected);
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("IMG_0001.DNG"), ("IMG_0001", Some("DNG")));
        assert_eq!(split_extension("a.b.c"), ("a.b", Some("c")));
        assert_eq!(split_extension(".hidden"), (".hidden", None));
        assert_eq!(split_extension("dir.d/file"), ("file", None));
    }
}
