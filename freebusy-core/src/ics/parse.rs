//! iCalendar parsing into event records, using the icalendar crate's parser.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use crate::error::{FreeBusyError, FreeBusyResult};
use crate::event::{EventRecord, Recurrence};

/// Parse every VEVENT of an ICS payload into event records.
///
/// Overridden instances (VEVENTs with RECURRENCE-ID) become one-off records and
/// their original slot is excluded from the master's recurrence set.
pub fn parse_events(content: &str, calendar_name: &str) -> FreeBusyResult<Vec<EventRecord>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| FreeBusyError::IcsParse(e.to_string()))?;

    let mut records = Vec::new();
    let mut overridden: Vec<(Option<String>, DateTime<Utc>)> = Vec::new();

    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        let record = parse_vevent(vevent, calendar_name)?;

        if let Some(recurrence_id) = vevent.find_prop("RECURRENCE-ID") {
            let original = to_utc(date_perhaps_time(recurrence_id)?)?;
            overridden.push((record.uid.clone(), original));
        }

        records.push(record);
    }

    for (uid, original) in overridden {
        let master = records
            .iter_mut()
            .find(|r| r.uid == uid && r.recurrence.is_some());
        if let Some(recurrence) = master.and_then(|m| m.recurrence.as_mut()) {
            recurrence.exdates.push(original);
        }
    }

    Ok(records)
}

fn parse_vevent(vevent: &Component, calendar_name: &str) -> FreeBusyResult<EventRecord> {
    let uid = vevent.find_prop("UID").map(|p| p.val.to_string());

    let dtstart_prop = vevent.find_prop("DTSTART").ok_or_else(|| {
        FreeBusyError::IcsParse(format!(
            "VEVENT {} has no DTSTART",
            uid.as_deref().unwrap_or("(no uid)")
        ))
    })?;
    let dtstart = date_perhaps_time(dtstart_prop)?;
    let all_day = matches!(dtstart, DatePerhapsTime::Date(_));
    let tzid = match &dtstart {
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { tzid, .. }) => Some(tzid.clone()),
        _ => None,
    };
    let start = to_utc(dtstart)?;

    // RFC 5545 3.6.1: without DTEND or DURATION a date event lasts one day, a datetime event zero
    let end = match (vevent.find_prop("DTEND"), vevent.find_prop("DURATION")) {
        (Some(dtend), _) => to_utc(date_perhaps_time(dtend)?)?,
        (None, Some(duration)) => {
            let duration = parse_duration(duration.val.as_ref())?;
            start.checked_add_signed(duration).ok_or_else(|| {
                FreeBusyError::IcsParse(format!(
                    "DURATION {} of VEVENT {} ends out of range",
                    duration,
                    uid.as_deref().unwrap_or("(no uid)")
                ))
            })?
        }
        (None, None) if all_day => start.checked_add_signed(Duration::days(1)).ok_or_else(|| {
            FreeBusyError::IcsParse(format!("all-day event on {} ends out of range", start))
        })?,
        (None, None) => start,
    };

    let recurrence = match vevent.find_prop("RRULE") {
        Some(rrule) => {
            let exdates = vevent
                .properties
                .iter()
                .filter(|p| p.name == "EXDATE")
                .map(|p| parse_exdate_property(p, tzid.as_deref()))
                .collect::<FreeBusyResult<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect();

            Some(Recurrence {
                rrule: rrule.val.to_string(),
                exdates,
                tzid,
            })
        }
        None => None,
    };

    Ok(EventRecord {
        uid,
        start,
        end,
        recurrence,
        calendar_name: calendar_name.to_string(),
    })
}

fn date_perhaps_time(prop: &Property) -> FreeBusyResult<DatePerhapsTime> {
    DatePerhapsTime::try_from(prop).map_err(|_| {
        FreeBusyError::IcsParse(format!("invalid {} value '{}'", prop.name, prop.val))
    })
}

/// Convert a DATE / DATE-TIME value to an absolute instant.
///
/// Dates are midnight UTC and floating times are read as UTC.
fn to_utc(dpt: DatePerhapsTime) -> FreeBusyResult<DateTime<Utc>> {
    match dpt {
        DatePerhapsTime::Date(d) => Ok(d.and_time(NaiveTime::MIN).and_utc()),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => Ok(dt),
            CalendarDateTime::Floating(naive) => Ok(naive.and_utc()),
            CalendarDateTime::WithTimezone { date_time, tzid } => resolve_local(&date_time, &tzid),
        },
    }
}

/// Resolve a wall-clock time in an IANA zone.
fn resolve_local(naive: &NaiveDateTime, tzid: &str) -> FreeBusyResult<DateTime<Utc>> {
    let tz: chrono_tz::Tz = tzid
        .parse()
        .map_err(|_| FreeBusyError::IcsParse(format!("unknown timezone '{}'", tzid)))?;

    // Times inside a DST gap are pushed forward by the gap length
    tz.from_local_datetime(naive)
        .earliest()
        .or_else(|| {
            naive
                .checked_add_signed(Duration::hours(1))
                .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
        })
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            FreeBusyError::IcsParse(format!("nonexistent local time {} in {}", naive, tzid))
        })
}

/// Parse a DURATION value (`PT1H30M`, `P1D`, `-PT15M`).
fn parse_duration(value: &str) -> FreeBusyResult<Duration> {
    let is_negative = value.starts_with('-');
    let duration_str = value.trim_start_matches(['-', '+']);

    let duration = iso8601::duration(duration_str)
        .map_err(|e| FreeBusyError::IcsParse(format!("invalid DURATION '{}': {}", value, e)))?;
    let std_duration: std::time::Duration = duration.into();
    let duration = Duration::from_std(std_duration)
        .map_err(|_| FreeBusyError::IcsParse(format!("DURATION out of range: {}", value)))?;

    Ok(if is_negative { -duration } else { duration })
}

/// Parse an EXDATE property into absolute instants.
///
/// Handles `TZID=` and `VALUE=DATE` parameters, UTC and floating values, and
/// comma-separated lists.
fn parse_exdate_property(
    prop: &Property,
    master_tzid: Option<&str>,
) -> FreeBusyResult<Vec<DateTime<Utc>>> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    let mut instants = Vec::new();
    for s in prop.val.as_ref().split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let invalid = || FreeBusyError::IcsParse(format!("invalid EXDATE value '{}'", s));

        let instant = if is_date {
            chrono::NaiveDate::parse_from_str(s, "%Y%m%d")
                .map_err(|_| invalid())?
                .and_time(NaiveTime::MIN)
                .and_utc()
        } else if let Some(utc) = s.strip_suffix('Z') {
            NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                .map_err(|_| invalid())?
                .and_utc()
        } else {
            let naive = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").map_err(|_| invalid())?;
            match tzid.as_deref().or(master_tzid) {
                Some(tz) => resolve_local(&naive, tz)?,
                None => naive.and_utc(),
            }
        };
        instants.push(instant);
    }

    Ok(instants)
}
