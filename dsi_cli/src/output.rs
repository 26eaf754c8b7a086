use clap::{ArgEnum, Args};
use meade_dsi::ImageView;
use simple_eyre::{eyre::eyre, Result};
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Args)]
pub struct Output {
    /// Path to a file where the image should be stored
    #[clap(short, long, value_parser = unique_path_parser, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    /// File format for the image
    #[clap(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

fn unique_path_parser(p: &str) -> Result<PathBuf> {
    let p = Path::new(p);
    if p.try_exists()? {
        Err(eyre!("Path {p:?} already exists"))
    } else {
        Ok(p.to_path_buf())
    }
}

#[derive(ArgEnum, Clone, Default)]
pub enum OutputFormat {
    #[default]
    Pgm,
    Csv,
}

/// Plain-text PGM, the same raster the vendor test tool writes.
fn image_to_pgm(image: &ImageView) -> String {
    log::trace!("Formatting image as PGM");
    let mut text = format!("P2\n{} {}\n65535\n", image.width, image.height);
    for row in image.data.chunks(image.width) {
        let line = row
            .iter()
            .map(|pixel| pixel.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        text.push_str(&line);
        text.push('\n');
    }
    text
}

fn image_to_csv(image: &ImageView) -> String {
    log::trace!("Formatting image as CSV");
    image
        .data
        .chunks(image.width)
        .map(|row| {
            row.iter()
                .map(|pixel| pixel.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Output {
    pub fn write_image(&self, image: &ImageView) -> Result<()> {
        log::debug!("Saving image to {:?}", self.output);
        let data = match self.format {
            OutputFormat::Pgm => image_to_pgm(image),
            OutputFormat::Csv => image_to_csv(image),
        };
        let mut out = File::create(self.output.as_path())?;
        out.write_all(data.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImageView<'static> {
        ImageView {
            data: &[1000, 2000, 3000, 4000],
            width: 2,
            height: 2,
        }
    }

    #[test]
    fn convert_image_to_pgm() {
        let pgm = image_to_pgm(&sample());
        let lines: Vec<_> = pgm.lines().collect();
        assert_eq!(lines[0], "P2");
        assert_eq!(lines[1], "2 2");
        assert_eq!(lines[2], "65535");
        assert_eq!(lines[3], "1000 2000");
        assert_eq!(lines[4], "3000 4000");
    }

    #[test]
    fn convert_image_to_csv() {
        let csv = image_to_csv(&sample());
        assert_eq!(csv, "1000,2000\n3000,4000");
    }
}
