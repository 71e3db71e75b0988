use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};

/// Packages must be at the office by this hour on the day before departure.
pub const SHIPPING_CUTOFF_HOUR: u32 = 18;

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "lunes",
        Weekday::Tue => "martes",
        Weekday::Wed => "miércoles",
        Weekday::Thu => "jueves",
        Weekday::Fri => "viernes",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

/// `martes 21 de octubre`
pub fn format_date(date: NaiveDate) -> String {
    format!("{} {} de {}", weekday_name(date.weekday()), date.day(), MONTHS[date.month0() as usize])
}

/// `lunes 20 de octubre a las 6:00 p. m.`
pub fn format_date_time(moment: NaiveDateTime) -> String {
    format!("{} a las {}", format_date(moment.date()), format_time(moment.time()))
}

pub fn format_time(time: NaiveTime) -> String {
    let (is_pm, hour) = time.hour12();
    let suffix = if is_pm { "p. m." } else { "a. m." };
    format!("{hour}:{:02} {suffix}", time.minute())
}

/// Office clocks run on Colombia time (UTC-5, no daylight saving).
pub const OFFICE_UTC_OFFSET_SECS: i32 = -5 * 3600;

/// Wall-clock time at the office for an instant.
pub fn office_time(now: DateTime<Utc>) -> NaiveDateTime {
    match FixedOffset::east_opt(OFFICE_UTC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).naive_local(),
        None => now.naive_utc(),
    }
}

/// Last moment a package is accepted for a trip departing on `departure`.
pub fn shipping_deadline(departure: NaiveDate) -> NaiveDateTime {
    let day_before = departure.pred_opt().unwrap_or(departure);
    let cutoff = NaiveTime::from_hms_opt(SHIPPING_CUTOFF_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    day_before.and_time(cutoff)
}
