//! Korean natural-language task entry.
//!
//! `"내일 오후 3시 보고서 작성"` becomes a task described as `"보고서 작성"`
//! due tomorrow at 15:00. Recognised tokens are stripped from a working copy
//! of the input in a fixed order; whatever remains is the description.
//! Once a date has been chosen, later rules may only add a time of day.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike,
};
use regex::{Captures, Regex};
use serde::Serialize;

use crate::model::datetime;
use crate::model::task::{Priority, Recurrence};

/// Structured result of parsing one line of input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTask {
    pub description: String,
    pub priority: Priority,
    #[serde(with = "crate::model::datetime::option")]
    pub due_date: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring: Option<Recurrence>,
}

/// Parse `text` relative to the current time in the fixed zone.
pub fn parse(text: &str) -> ParsedTask {
    parse_at(text, datetime::now_local())
}

/// Parse `text` relative to `now` (wall time in the fixed zone).
pub fn parse_at(text: &str, now: NaiveDateTime) -> ParsedTask {
    let today = now.date();
    let mut w = Working {
        rest: text.trim().to_string(),
        due: None,
    };

    let priority = take_priority(&mut w);
    let recurring = take_recurrence(&mut w);
    take_relative_time(&mut w, now);
    take_calendar_date(&mut w, now);
    take_named_day(&mut w, today);
    take_weekday(&mut w, today);
    take_weekend(&mut w, today);
    take_month_marker(&mut w, today);
    take_time_idiom(&mut w, today);
    take_clock_hour(&mut w, today);
    take_minutes(&mut w);

    let description = WHITESPACE
        .replace_all(&w.rest.replace("까지", ""), " ")
        .trim()
        .to_string();

    ParsedTask {
        description,
        priority,
        due_date: w.due.map(datetime::to_zoned),
        recurring,
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect("static pattern compiles"));
    };
}

pattern!(PRIORITY_HIGH, r"#?(?:긴급|중요|높음)|!!|🔴");
pattern!(PRIORITY_MEDIUM, r"#?보통");
pattern!(PRIORITY_LOW, r"#?낮음");

pattern!(EVERY_DAY, r"매일");
pattern!(EVERY_WEEK, r"매주");
pattern!(EVERY_MONTH, r"매달|매월");

pattern!(HOURS_LATER, r"(\d+)\s*시간\s*(?:후|뒤)");
pattern!(MINUTES_LATER, r"(\d+)\s*분\s*(?:후|뒤)");
pattern!(MONTHS_LATER, r"(\d+)\s*(?:달|개월)\s*(?:후|뒤)");
pattern!(YEARS_LATER, r"(\d+)\s*년\s*(?:후|뒤)");
pattern!(EXPLICIT_DATE, r"(?:(\d{4})년\s*)?(\d{1,2})월\s*(\d{1,2})일");
pattern!(MONTH_ONLY, r"(\d{1,2})월");
pattern!(DAYS_LATER, r"(\d+)\s*일\s*(?:후|뒤)");

pattern!(TODAY_SOMETIME, r"오늘\s*중에|나중에");
pattern!(TODAY, r"오늘(?:까지)?");
pattern!(TOMORROW, r"내일(?:까지)?");
pattern!(DAY_AFTER_TOMORROW, r"모레(?:까지)?");
// group 1 marks "다음 주말", which belongs to the weekend rule
pattern!(NEXT_WEEK, r"다음\s*주(말)?(?:까지)?");
pattern!(YESTERDAY, r"어제");
pattern!(LAST_WEEK, r"지난\s*주");

pattern!(WEEKDAY_FULL, r"(다음\s*|이번\s*주\s*)?([월화수목금토일])요일(?:까지)?");
// bare syllables count only as a standalone token with a modifier or 까지
pattern!(
    WEEKDAY_SHORT,
    r"(?:^|\s)(다음\s*|이번\s*주\s*)?([월화수목금토일])(까지)?(?:\s|$)"
);

pattern!(THIS_WEEKEND, r"이번\s*주말");
pattern!(NEXT_WEEKEND, r"다음\s*주말");
pattern!(NEXT_MONTH, r"다음\s*달");
pattern!(END_OF_MONTH, r"이번\s*달\s*말");

pattern!(MERIDIEM_HOUR, r"(오전|오후)\s*\d{1,2}\s*시");
// group 3 marks "N시간", a duration rather than a clock hour
pattern!(CLOCK_HOUR, r"(오전|오후)?\s*(\d{1,2})\s*시(간)?");
// group 2 marks "N분 후", already consumed as a relative offset
pattern!(CLOCK_MINUTE, r"(\d{1,2})\s*분(\s*(?:후|뒤))?");

pattern!(WHITESPACE, r"\s+");

/// Time-of-day words and the hour they stand for. Longer spellings first.
const TIME_IDIOMS: &[(&str, u32)] = &[
    ("새벽", 5),
    ("아침", 8),
    ("오전", 10),
    ("점심 시간", 12),
    ("점심시간", 12),
    ("점심", 12),
    ("정오", 12),
    ("오후", 14),
    ("저녁", 18),
    ("심야", 23),
    ("밤", 21),
];

// ---------------------------------------------------------------------------
// Working copy
// ---------------------------------------------------------------------------

struct Working {
    rest: String,
    due: Option<NaiveDateTime>,
}

impl Working {
    fn strip_all(&mut self, re: &Regex) {
        self.rest = re.replace_all(&self.rest, "").trim().to_string();
    }

    fn strip_first(&mut self, re: &Regex) {
        self.rest = re.replace(&self.rest, "").trim().to_string();
    }

    /// Remove every match except those where capture `marker` participated.
    fn strip_unless(&mut self, re: &Regex, marker: usize) {
        self.rest = re
            .replace_all(&self.rest, |caps: &Captures| {
                if caps.get(marker).is_some() {
                    caps[0].to_string()
                } else {
                    String::new()
                }
            })
            .trim()
            .to_string();
    }

    fn set_date(&mut self, date: NaiveDate) {
        self.due = Some(date.and_time(NaiveTime::MIN));
    }
}

/// First match of `re` in `hay` where capture `marker` did not participate.
fn first_unless<'h>(re: &Regex, hay: &'h str, marker: usize) -> Option<Captures<'h>> {
    re.captures_iter(hay).find(|c| c.get(marker).is_none())
}

fn number<T: std::str::FromStr>(caps: &Captures, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

/// Calendar arithmetic with overflow carried into the next unit:
/// month 12 is January of the following year, day 0 is the last day of
/// the previous month.
fn calendar_date(year: i64, month0: i64, day: i64) -> Option<NaiveDate> {
    let year = year.checked_add(month0.div_euclid(12))?;
    let month = u32::try_from(month0.rem_euclid(12)).ok()? + 1;
    let first = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, 1)?;
    first.checked_add_signed(TimeDelta::try_days(day.checked_sub(1)?)?)
}

fn days_from(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    today.checked_add_signed(TimeDelta::try_days(days)?)
}

/// Set the wall-clock hour (minutes cleared); hours past 23 roll into the next day.
/// `None` past the end of the calendar.
fn at_hour(date: NaiveDate, hour: u32) -> Option<NaiveDateTime> {
    date.and_time(NaiveTime::MIN)
        .checked_add_signed(TimeDelta::try_hours(i64::from(hour))?)
}

// ---------------------------------------------------------------------------
// Rules, in application order
// ---------------------------------------------------------------------------

fn take_priority(w: &mut Working) -> Priority {
    for (re, priority) in [
        (&*PRIORITY_HIGH, Priority::High),
        (&*PRIORITY_MEDIUM, Priority::Medium),
        (&*PRIORITY_LOW, Priority::Low),
    ] {
        if re.is_match(&w.rest) {
            w.strip_all(re);
            return priority;
        }
    }
    Priority::None
}

fn take_recurrence(w: &mut Working) -> Option<Recurrence> {
    for (re, recurrence) in [
        (&*EVERY_DAY, Recurrence::Daily),
        (&*EVERY_WEEK, Recurrence::Weekly),
        (&*EVERY_MONTH, Recurrence::Monthly),
    ] {
        if re.is_match(&w.rest) {
            w.strip_all(re);
            return Some(recurrence);
        }
    }
    None
}

/// "N시간 후" / "N분 뒤": offset from now, rounded up to the next half hour.
fn take_relative_time(w: &mut Working, now: NaiveDateTime) {
    let hours: Option<i64> = HOURS_LATER.captures(&w.rest).and_then(|c| number(&c, 1));
    let minutes: Option<i64> = MINUTES_LATER.captures(&w.rest).and_then(|c| number(&c, 1));
    if hours.is_none() && minutes.is_none() {
        return;
    }

    let mut due = now;
    if let Some(h) = hours {
        if let Some(next) = TimeDelta::try_hours(h).and_then(|d| due.checked_add_signed(d)) {
            due = next;
        }
        w.strip_all(&HOURS_LATER);
    }
    if let Some(m) = minutes {
        if let Some(next) = TimeDelta::try_minutes(m).and_then(|d| due.checked_add_signed(d)) {
            due = next;
        }
        w.strip_all(&MINUTES_LATER);
    }
    if let Some(rounded) = round_up_to_half_hour(due) {
        w.due = Some(rounded);
    }
}

fn round_up_to_half_hour(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    let base = dt.date().and_hms_opt(dt.hour(), dt.minute(), 0).unwrap_or(dt);
    match base.minute() {
        0 => Some(base),
        1..=30 => base.with_minute(30),
        _ => base.with_minute(0)?.checked_add_signed(TimeDelta::hours(1)),
    }
}

/// Month/year offsets, explicit dates, month-only dates and "N일 후".
fn take_calendar_date(w: &mut Working, now: NaiveDateTime) {
    let today = now.date();
    let (year, month0, day) = (
        i64::from(today.year()),
        i64::from(today.month0()),
        i64::from(today.day()),
    );

    if w.due.is_none() {
        let months: Option<i64> = MONTHS_LATER.captures(&w.rest).and_then(|c| number(&c, 1));
        if let Some(date) = months.and_then(|n| calendar_date(year, month0.checked_add(n)?, day)) {
            w.set_date(date);
            w.strip_all(&MONTHS_LATER);
        }
    }

    if w.due.is_none() {
        let years: Option<i64> = YEARS_LATER.captures(&w.rest).and_then(|c| number(&c, 1));
        if let Some(date) = years.and_then(|n| calendar_date(year.checked_add(n)?, month0, day)) {
            w.set_date(date);
            w.strip_all(&YEARS_LATER);
        }
    }

    if w.due.is_none() {
        let explicit = EXPLICIT_DATE.captures(&w.rest).map(|caps| {
            (
                number::<i64>(&caps, 1),
                number::<i64>(&caps, 2),
                number::<i64>(&caps, 3),
            )
        });
        if let Some((explicit_year, m, d)) = explicit {
            if let (Some(m), Some(d)) = (m, d) {
                let mut date = calendar_date(explicit_year.unwrap_or(year), m - 1, d);
                // without a year, a date already behind us means next year's
                if explicit_year.is_none()
                    && date.is_some_and(|dt| dt.and_time(NaiveTime::MIN) < now)
                {
                    date = calendar_date(year + 1, m - 1, d);
                }
                if let Some(date) = date {
                    w.set_date(date);
                    w.strip_all(&EXPLICIT_DATE);
                }
            }
        }
    }

    if w.due.is_none() {
        let month: Option<i64> = MONTH_ONLY.captures(&w.rest).and_then(|c| number(&c, 1));
        if let Some(m) = month {
            let mut date = calendar_date(year, m - 1, 1);
            let this_month = calendar_date(year, month0, 1);
            if date < this_month {
                date = calendar_date(year + 1, m - 1, 1);
            }
            if let Some(date) = date {
                w.set_date(date);
                w.strip_all(&MONTH_ONLY);
            }
        }
    }

    if w.due.is_none() {
        let days: Option<i64> = DAYS_LATER.captures(&w.rest).and_then(|c| number(&c, 1));
        if let Some(date) = days.and_then(|n| days_from(today, n)) {
            w.set_date(date);
            w.strip_all(&DAYS_LATER);
        }
    }
}

/// 오늘 / 내일 / 모레 / 다음 주 / 어제 / 지난 주. First idiom present wins.
fn take_named_day(w: &mut Working, today: NaiveDate) {
    if w.due.is_some() {
        return;
    }

    // the third field names a capture that disqualifies a match
    let rules: [(&Regex, i64, Option<usize>); 7] = [
        (&*TODAY_SOMETIME, 0, None),
        (&*TODAY, 0, None),
        (&*TOMORROW, 1, None),
        (&*DAY_AFTER_TOMORROW, 2, None),
        // "다음 주말" is left for the weekend rule
        (&*NEXT_WEEK, 7, Some(1)),
        (&*YESTERDAY, -1, None),
        (&*LAST_WEEK, -7, None),
    ];

    for (re, offset, exclude) in rules {
        let matched = match exclude {
            Some(marker) => first_unless(re, &w.rest, marker).is_some(),
            None => re.is_match(&w.rest),
        };
        if !matched {
            continue;
        }
        if let Some(date) = days_from(today, offset) {
            w.set_date(date);
        }
        match exclude {
            Some(marker) => w.strip_unless(re, marker),
            None => w.strip_all(re),
        }
        return;
    }
}

/// Weekday names. The token is always removed; it only sets the date when
/// nothing earlier did. Today never counts for a bare weekday.
fn take_weekday(w: &mut Working, today: NaiveDate) {
    let hit = |caps: Captures| {
        (
            caps.get(0).map(|m| m.range()),
            modifier_is_next(&caps),
            weekday_index(&caps[2]),
        )
    };
    let found = match WEEKDAY_FULL.captures(&w.rest) {
        Some(caps) => Some(hit(caps)),
        None => WEEKDAY_SHORT
            .captures_iter(&w.rest)
            .find(|c| c.get(1).is_some() || c.get(3).is_some())
            .map(hit),
    };

    let Some((Some(range), next, Some(target))) = found else {
        return;
    };

    w.rest.replace_range(range, " ");
    w.rest = w.rest.trim().to_string();

    if w.due.is_none() {
        let current = i64::from(today.weekday().num_days_from_sunday());
        let mut days_until = target - current;
        if next || days_until <= 0 {
            days_until += 7;
        }
        if let Some(date) = days_from(today, days_until) {
            w.set_date(date);
        }
    }
}

fn modifier_is_next(caps: &Captures) -> bool {
    caps.get(1).is_some_and(|m| m.as_str().contains("다음"))
}

/// Days from Sunday, matching `Weekday::num_days_from_sunday`.
fn weekday_index(syllable: &str) -> Option<i64> {
    match syllable {
        "일" => Some(0),
        "월" => Some(1),
        "화" => Some(2),
        "수" => Some(3),
        "목" => Some(4),
        "금" => Some(5),
        "토" => Some(6),
        _ => None,
    }
}

fn take_weekend(w: &mut Working, today: NaiveDate) {
    if w.due.is_some() {
        return;
    }
    let current = i64::from(today.weekday().num_days_from_sunday());
    let days_until_saturday = match (6 - current).rem_euclid(7) {
        0 => 7,
        n => n,
    };

    if THIS_WEEKEND.is_match(&w.rest) {
        if let Some(date) = days_from(today, days_until_saturday) {
            w.set_date(date);
        }
        w.strip_all(&THIS_WEEKEND);
    } else if NEXT_WEEKEND.is_match(&w.rest) {
        if let Some(date) = days_from(today, days_until_saturday + 7) {
            w.set_date(date);
        }
        w.strip_all(&NEXT_WEEKEND);
    }
}

fn take_month_marker(w: &mut Working, today: NaiveDate) {
    let (year, month0) = (i64::from(today.year()), i64::from(today.month0()));

    if w.due.is_none() && NEXT_MONTH.is_match(&w.rest) {
        if let Some(date) = calendar_date(year, month0 + 1, 1) {
            w.set_date(date);
        }
        w.strip_all(&NEXT_MONTH);
    }

    if w.due.is_none() && END_OF_MONTH.is_match(&w.rest) {
        if let Some(date) = calendar_date(year, month0 + 1, 0) {
            w.set_date(date);
        }
        w.strip_all(&END_OF_MONTH);
    }
}

/// 새벽, 아침, 점심 ... only add a time when none has been set.
fn take_time_idiom(w: &mut Working, today: NaiveDate) {
    for &(word, hour) in TIME_IDIOMS {
        if !w.rest.contains(word) {
            continue;
        }
        // "오후 3시" is an explicit clock time, handled by the next rule
        if MERIDIEM_HOUR.captures_iter(&w.rest).any(|c| &c[1] == word) {
            continue;
        }

        let date = match w.due {
            None => Some(today),
            Some(due) if due.time() == NaiveTime::MIN => Some(due.date()),
            Some(_) => None,
        };
        if let Some(at) = date.and_then(|d| at_hour(d, hour)) {
            w.due = Some(at);
        }
        w.rest = w.rest.replace(word, "").trim().to_string();
        return;
    }
}

/// "[오전|오후] H시". Sets the hour on the chosen date, or on today.
fn take_clock_hour(w: &mut Working, today: NaiveDate) {
    let Some(caps) = first_unless(&CLOCK_HOUR, &w.rest, 3) else {
        return;
    };
    let Some(mut hour) = number::<u32>(&caps, 2) else {
        return;
    };
    match caps.get(1).map(|m| m.as_str()) {
        Some("오후") if hour < 12 => hour += 12,
        Some("오전") if hour == 12 => hour = 0,
        _ => {}
    }

    let date = w.due.map(|d| d.date()).unwrap_or(today);
    if let Some(at) = at_hour(date, hour) {
        w.due = Some(at);
    }
    w.strip_unless(&CLOCK_HOUR, 3);
}

/// "M분" only refines a time that already has a date.
fn take_minutes(w: &mut Working) {
    let Some(due) = w.due else {
        return;
    };
    let Some(caps) = first_unless(&CLOCK_MINUTE, &w.rest, 2) else {
        return;
    };
    let Some(minute) = number::<i64>(&caps, 1) else {
        return;
    };

    let top_of_hour = due.with_minute(0).unwrap_or(due);
    let at = TimeDelta::try_minutes(minute).and_then(|d| top_of_hour.checked_add_signed(d));
    if let Some(at) = at {
        w.due = Some(at);
    }
    w.strip_unless(&CLOCK_MINUTE, 2);
}

// ---------------------------------------------------------------------------
// Placeholder examples
// ---------------------------------------------------------------------------

const EXAMPLES_KO: &[&str] = &[
    "내일 오후 3시 보고서 작성",
    "매주 월요일 아침 9시 팀 회의",
    "이번 주 금요일까지 프로젝트 완료",
    "오늘 저녁 7시 친구와 약속",
    "11월 25일 점심 식사 예약",
    "매일 아침 7시 운동",
    "3일 후 오후 2시 치과 예약",
    "다음 주 월요일까지 자료 조사",
    "내일 정오 점심 약속",
    "오늘 밤 9시 영화 보기",
    "매달 1일 관리비 납부",
    "오후 2시 미팅",
    "내일 새벽 5시 기상",
];

const EXAMPLES_EN: &[&str] = &[
    "Meeting tomorrow at 3pm",
    "Team meeting every Monday at 9am",
    "Finish project by this Friday",
    "Dinner with friends today at 7pm",
    "Lunch reservation on Nov 25",
    "Workout every day at 7am",
    "Dentist appointment in 3 days at 2pm",
    "Research by next Monday",
    "Lunch at noon tomorrow",
    "Watch movie tonight at 9pm",
];

/// Example inputs shown as input hints. Unknown languages get Korean.
pub fn parser_examples(lang: &str) -> &'static [&'static str] {
    match lang {
        "en" => EXAMPLES_EN,
        _ => EXAMPLES_KO,
    }
}

/// Pick one example; `seed` is typically derived from the clock.
pub fn example_for(lang: &str, seed: usize) -> &'static str {
    let list = parser_examples(lang);
    list[seed % list.len()]
}
