use anyhow::{Context, Result};
use inquire::validator::Validation;
use inquire::{CustomType, CustomUserError, Text};

use crate::args::EpisodeRange;

pub fn prompt_for_series(default: Option<&str>) -> Result<String> {
    let series = Text::new("series:")
        .with_help_message("anime3rb title url, episode url or slug")
        .with_initial_value(default.unwrap_or_default())
        .prompt()
        .context("failed to read series URL")?;
    Ok(series.trim().to_string())
}

/// asks for an inclusive 1-indexed range within `1..=total`.
pub fn prompt_for_episodes(total: usize) -> Result<EpisodeRange> {
    let start = CustomType::<usize>::new("start episode:")
        .with_default(1)
        .with_help_message(&format!("1 to {total}"))
        .with_error_message("please type a whole number")
        .with_validator(move |value: &usize| -> Result<Validation, CustomUserError> {
            Ok(within(*value, 1, total))
        })
        .prompt()
        .context("failed to read start episode")?;

    let end = CustomType::<usize>::new("end episode:")
        .with_default(total)
        .with_help_message(&format!("{start} to {total}"))
        .with_error_message("please type a whole number")
        .with_validator(move |value: &usize| -> Result<Validation, CustomUserError> {
            Ok(within(*value, start, total))
        })
        .prompt()
        .context("failed to read end episode")?;

    Ok(EpisodeRange::Range { start, end })
}

fn within(value: usize, low: usize, high: usize) -> Validation {
    if (low..=high).contains(&value) {
        Validation::Valid
    } else {
        Validation::Invalid(format!("must be between {low} and {high}").into())
    }
}
