// vintagebackup is an incremental backup tool based on hard-linked snapshots
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Calculations with dates and time spans.

use anyhow::{Result, bail};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::errors::CommandLineError;

/// Parse a time span like "6m" into the timepoint that long before `now`.
///
/// The span is a positive integer followed by a single letter: "d" for days,
/// "w" for weeks, "m" for calendar months, and "y" for calendar years.
/// Month and year arithmetic clamps the day to the end of the resulting month
/// when needed, so one month before March 31 is the last day of February.
pub fn parse_time_span_to_timepoint(time_span: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let time_span: String = time_span.to_lowercase().split_whitespace().collect();
    if time_span.len() < 2 || !time_span.is_ascii() {
        bail!(CommandLineError(format!(
            "Invalid time span (valid units: d, w, m, y): {time_span}"
        )));
    }

    let (number_text, letter) = time_span.split_at(time_span.len() - 1);
    let number: i64 = number_text.parse().map_err(|_| {
        CommandLineError(format!(
            "Invalid number in time span (must be a whole number): {time_span}"
        ))
    })?;
    if number < 1 {
        bail!(CommandLineError(format!(
            "Invalid number in time span (must be positive): {time_span}"
        )));
    }

    match letter {
        "d" => Ok(now - Duration::days(number)),
        "w" => Ok(now - Duration::weeks(number)),
        "m" => Ok(NaiveDateTime::new(months_ago(now.date(), number), now.time())),
        "y" => {
            let date = fix_end_of_month(
                now.year() - number as i32,
                now.month(),
                now.day(),
            );
            Ok(NaiveDateTime::new(date, now.time()))
        }
        _ => bail!(CommandLineError(format!(
            "Invalid time span (valid units: d, w, m, y): {time_span}"
        ))),
    }
}

/// Return a date that is a number of calendar months before the given one.
///
/// The day of the month is not changed unless necessary to produce a valid
/// date (see [`fix_end_of_month`]).
pub fn months_ago(date: NaiveDate, month_count: i64) -> NaiveDate {
    let mut new_month = date.month() as i64 - (month_count % 12);
    let mut new_year = date.year() as i64 - (month_count / 12);
    if new_month < 1 {
        new_month += 12;
        new_year -= 1;
    }
    fix_end_of_month(new_year as i32, new_month as u32, date.day())
}

/// Replace a day past the end of the month (e.g., Feb. 31) with the last day
/// of the same month. All other days are unaffected.
pub fn fix_end_of_month(year: i32, month: u32, day: u32) -> NaiveDate {
    let mut day = day;
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return date;
        }
        day -= 1;
    }
}
