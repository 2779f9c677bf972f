//! Calendar decomposition of distinct event timestamps.

use std::collections::BTreeSet;

use chrono::{Datelike, Timelike};
use polars::prelude::{DataFrame, IntoColumn, NamedFrom, Series};
use wap_model::TimeParts;
use wap_model::time::{EVENT_TIME_FORMAT, datetime_of_epoch_millis};

use super::staging_name;
use crate::error::Result;
use crate::frame::cell_millis;

pub fn apply(rule: &TimeParts, source: &DataFrame) -> Result<DataFrame> {
    let relation = staging_name(&rule.source);
    let distinct: BTreeSet<i64> = cell_millis(source, &relation, &rule.time_column)?
        .into_iter()
        .flatten()
        .collect();

    let mut start_times = Vec::with_capacity(distinct.len());
    let mut hours = Vec::with_capacity(distinct.len());
    let mut days = Vec::with_capacity(distinct.len());
    let mut weeks = Vec::with_capacity(distinct.len());
    let mut months = Vec::with_capacity(distinct.len());
    let mut years = Vec::with_capacity(distinct.len());
    let mut weekdays = Vec::with_capacity(distinct.len());
    for dt in distinct.into_iter().filter_map(datetime_of_epoch_millis) {
        start_times.push(dt.format(EVENT_TIME_FORMAT).to_string());
        hours.push(dt.hour() as i32);
        days.push(dt.day() as i32);
        weeks.push(dt.iso_week().week() as i32);
        months.push(dt.month() as i32);
        years.push(dt.year());
        // 0 = Sunday
        weekdays.push(dt.weekday().num_days_from_sunday() as i32);
    }

    Ok(DataFrame::new(vec![
        Series::new(rule.alias.as_str().into(), start_times).into_column(),
        Series::new("hour".into(), hours).into_column(),
        Series::new("day".into(), days).into_column(),
        Series::new("week".into(), weeks).into_column(),
        Series::new("month".into(), months).into_column(),
        Series::new("year".into(), years).into_column(),
        Series::new("weekday".into(), weekdays).into_column(),
    ])?)
}
