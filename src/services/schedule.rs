//! # Horarios de restaurantes
//!
//! Funciones puras que deciden si un restaurante está abierto a partir de su
//! horario y de la hora local del restaurante.
//!
//! Las horas se guardan como `HH:MM` de 24 horas. Una vez normalizadas a dos
//! dígitos, la comparación lexicográfica de cadenas equivale a la comparación
//! de horas, que es lo que usan [`is_open`] y [`get_status`].
//!
//! Un intervalo con `close_time <= open_time` cruza la medianoche
//! (por ejemplo `20:00 - 02:00`).

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::api::{AppError, AppResult};
use crate::db::RestaurantSchedule;

/// Nombres abreviados de los días, 0 = domingo
pub const DAY_NAMES: [&str; 7] = ["Dom", "Lun", "Mar", "Mié", "Jue", "Vie", "Sáb"];

/// Estado de apertura con mensaje para mostrar al cliente
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStatus {
    pub is_open: bool,
    pub message: String,
}

/// Resumen completo del horario para la superficie de consulta
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    pub schedule: RestaurantSchedule,
    pub is_open: bool,
    pub message: String,
    pub formatted: String,
    pub minutes_until_open: Option<i64>,
}

/// Cambio de horario enviado por el dueño del restaurante
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSchedule {
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    /// Enteros 0-6 separados por comas, `""` para ninguno
    pub closed_days: Option<String>,
}

/// Parsea `H:MM` o `HH:MM` con hora 0-23 y minuto 00-59.
fn parse_hhmm(value: &str) -> Option<(u32, u32)> {
    let (hour, minute) = value.split_once(':')?;
    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return None;
    }
    if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    (hour <= 23 && minute <= 59).then_some((hour, minute))
}

/// Valida una hora individual en formato `HH:MM`
pub fn is_valid_time(value: &str) -> bool {
    parse_hhmm(value).is_some()
}

/// Validación de formato de ambas horas.
///
/// No exige que apertura y cierre sean distintas.
pub fn is_valid_schedule(open_time: &str, close_time: &str) -> bool {
    is_valid_time(open_time) && is_valid_time(close_time)
}

/// `"8:05"` -> `"08:05"`; `None` si el formato no es válido
pub fn normalize_time(value: &str) -> Option<String> {
    parse_hhmm(value).map(|(h, m)| format!("{:02}:{:02}", h, m))
}

fn current_day(now: &NaiveDateTime) -> u8 {
    now.weekday().num_days_from_sunday() as u8
}

fn current_time(now: &NaiveDateTime) -> String {
    now.format("%H:%M").to_string()
}

fn normalized_bound(value: Option<&String>, field: &str) -> Option<String> {
    let raw = value?;
    let normalized = normalize_time(raw);
    if normalized.is_none() {
        tracing::warn!(field = %field, value = %raw, "Ignoring malformed schedule time");
    }
    normalized
}

/// Indica si el restaurante está abierto en `now` (hora local del restaurante).
///
/// Sin horas configuradas el restaurante se considera abierto.
pub fn is_open(schedule: &RestaurantSchedule, now: NaiveDateTime) -> bool {
    if schedule.closed_days.contains(&current_day(&now)) {
        return false;
    }

    let open = normalized_bound(schedule.open_time.as_ref(), "open_time");
    let close = normalized_bound(schedule.close_time.as_ref(), "close_time");

    match (open, close) {
        (Some(open), Some(close)) => {
            let time = current_time(&now);
            if close > open {
                open <= time && time <= close
            } else {
                time >= open || time <= close
            }
        }
        _ => true,
    }
}

pub fn get_status(schedule: &RestaurantSchedule, now: NaiveDateTime) -> ScheduleStatus {
    if is_open(schedule, now) {
        return ScheduleStatus {
            is_open: true,
            message: "Abierto ahora".to_string(),
        };
    }

    let message = if schedule.closed_days.contains(&current_day(&now)) {
        "Cerrado hoy".to_string()
    } else if let Some(open_time) = &schedule.open_time {
        format!("Abre a las {}", open_time)
    } else {
        "Cerrado".to_string()
    };

    ScheduleStatus {
        is_open: false,
        message,
    }
}

/// Minutos hasta la próxima apertura.
///
/// Si la hora de apertura de hoy ya pasó, o es exactamente `now`, se calcula
/// para mañana. `None` sin hora de apertura.
pub fn minutes_until_open(schedule: &RestaurantSchedule, now: NaiveDateTime) -> Option<i64> {
    let (hour, minute) = parse_hhmm(schedule.open_time.as_deref()?)?;
    let open = NaiveTime::from_hms_opt(hour, minute, 0)?;

    let mut next = now.date().and_time(open);
    if next <= now {
        next += Duration::days(1);
    }
    Some((next - now).num_minutes())
}

pub fn format_schedule(schedule: &RestaurantSchedule) -> String {
    let mut text = match (&schedule.open_time, &schedule.close_time) {
        (Some(open), Some(close)) => format!("{} - {}", open, close),
        _ => "Horario no disponible".to_string(),
    };

    if !schedule.closed_days.is_empty() {
        let names: Vec<&str> = schedule
            .closed_days
            .iter()
            .filter_map(|day| DAY_NAMES.get(usize::from(*day)).copied())
            .collect();
        text.push_str(&format!(" (Cerrado: {})", names.join(", ")));
    }
    text
}

pub fn summarize(schedule: RestaurantSchedule, now: NaiveDateTime) -> ScheduleSummary {
    let status = get_status(&schedule, now);
    let minutes = if status.is_open {
        None
    } else {
        minutes_until_open(&schedule, now)
    };
    ScheduleSummary {
        formatted: format_schedule(&schedule),
        is_open: status.is_open,
        message: status.message,
        minutes_until_open: minutes,
        schedule,
    }
}

/// Parsea días cerrados en formato `"0,6"`.
///
/// La cadena vacía significa ningún día cerrado.
pub fn parse_closed_days(raw: &str) -> AppResult<BTreeSet<u8>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(BTreeSet::new());
    }

    raw.split(',')
        .map(|part| {
            let part = part.trim();
            match part.parse::<u8>() {
                Ok(day) if day <= 6 => Ok(day),
                _ => Err(AppError::validation_field(
                    "closedDays",
                    &format!("'{}' no es un día válido (0-6)", part),
                )),
            }
        })
        .collect()
}

pub fn format_closed_days(days: &BTreeSet<u8>) -> String {
    days.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Valida un cambio de horario y lo convierte al modelo persistido.
///
/// Las horas se guardan normalizadas a `HH:MM`. Ambas deben venir juntas o
/// ninguna de las dos.
pub fn validate_schedule_update(update: &UpdateSchedule) -> AppResult<RestaurantSchedule> {
    let (open_time, close_time) = match (&update.open_time, &update.close_time) {
        (Some(open), Some(close)) => {
            if !is_valid_schedule(open, close) {
                return Err(AppError::Validation(
                    "Formato de hora inválido, use HH:MM".to_string(),
                ));
            }
            (normalize_time(open), normalize_time(close))
        }
        (None, None) => (None, None),
        (Some(_), None) => {
            return Err(AppError::validation_field("closeTime", "es requerida junto a openTime"))
        }
        (None, Some(_)) => {
            return Err(AppError::validation_field("openTime", "es requerida junto a closeTime"))
        }
    };

    let closed_days = match update.closed_days.as_deref() {
        Some(raw) => parse_closed_days(raw)?,
        None => BTreeSet::new(),
    };

    Ok(RestaurantSchedule {
        open_time,
        close_time,
        closed_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2024-06-03 es lunes, 2024-06-02 domingo, 2024-06-08 sábado
    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn schedule(open: Option<&str>, close: Option<&str>, closed: &[u8]) -> RestaurantSchedule {
        RestaurantSchedule {
            open_time: open.map(str::to_string),
            close_time: close.map(str::to_string),
            closed_days: closed.iter().copied().collect(),
        }
    }

    #[test]
    fn normal_interval_is_inclusive() {
        let s = schedule(Some("09:00"), Some("17:30"), &[]);
        assert!(!is_open(&s, at(3, 8, 59)));
        assert!(is_open(&s, at(3, 9, 0)));
        assert!(is_open(&s, at(3, 12, 0)));
        assert!(is_open(&s, at(3, 17, 30)));
        assert!(!is_open(&s, at(3, 17, 31)));
    }

    #[test]
    fn normal_interval_matches_brute_force_over_the_day() {
        let s = schedule(Some("11:15"), Some("22:45"), &[]);
        for minute_of_day in 0..(24 * 60) {
            let now = at(4, minute_of_day / 60, minute_of_day % 60);
            let expected = (11 * 60 + 15..=22 * 60 + 45).contains(&minute_of_day);
            assert_eq!(is_open(&s, now), expected, "minute {}", minute_of_day);
        }
    }

    #[test]
    fn wraparound_interval_crosses_midnight() {
        let s = schedule(Some("20:00"), Some("02:00"), &[]);
        assert!(is_open(&s, at(3, 23, 0)));
        assert!(is_open(&s, at(3, 1, 30)));
        assert!(is_open(&s, at(3, 2, 0)));
        assert!(!is_open(&s, at(3, 10, 0)));
        assert!(!is_open(&s, at(3, 19, 59)));
    }

    #[test]
    fn closed_days_override_the_window() {
        let mut s = schedule(Some("00:00"), Some("23:59"), &[]);
        s.closed_days = parse_closed_days("0,6").unwrap();
        assert!(!is_open(&s, at(2, 12, 0)));
        assert!(!is_open(&s, at(8, 12, 0)));
        assert!(is_open(&s, at(3, 12, 0)));
    }

    #[test]
    fn no_times_means_open() {
        let s = schedule(None, None, &[]);
        assert!(is_open(&s, at(3, 4, 0)));
        assert!(is_open(&s, at(5, 23, 59)));

        let only_open = schedule(Some("10:00"), None, &[]);
        assert!(is_open(&only_open, at(3, 4, 0)));
    }

    #[test]
    fn single_digit_hours_are_normalized() {
        let s = schedule(Some("8:00"), Some("17:00"), &[]);
        assert!(is_open(&s, at(3, 9, 0)));
        assert!(!is_open(&s, at(3, 7, 0)));
    }

    #[test]
    fn status_messages_follow_priority() {
        let s = schedule(Some("09:00"), Some("17:00"), &[0]);
        assert_eq!(get_status(&s, at(2, 12, 0)).message, "Cerrado hoy");
        assert_eq!(get_status(&s, at(3, 7, 0)).message, "Abre a las 09:00");

        let open = get_status(&s, at(3, 12, 0));
        assert!(open.is_open);
        assert_eq!(open.message, "Abierto ahora");

        let no_open = schedule(None, Some("17:00"), &[0]);
        assert_eq!(get_status(&no_open, at(2, 12, 0)).message, "Cerrado hoy");
    }

    #[test]
    fn minutes_until_open_rolls_over_at_exact_time() {
        let s = schedule(Some("08:00"), Some("16:00"), &[]);
        assert_eq!(minutes_until_open(&s, at(3, 7, 0)), Some(60));
        assert_eq!(minutes_until_open(&s, at(3, 8, 0)), Some(24 * 60));
        assert_eq!(minutes_until_open(&s, at(3, 9, 0)), Some(23 * 60));

        let half_past = at(3, 7, 0) + Duration::seconds(30);
        assert_eq!(minutes_until_open(&s, half_past), Some(59));

        assert_eq!(minutes_until_open(&schedule(None, None, &[]), at(3, 7, 0)), None);
    }

    #[test]
    fn format_schedule_renders_days() {
        assert_eq!(
            format_schedule(&schedule(Some("09:00"), Some("17:00"), &[])),
            "09:00 - 17:00"
        );
        assert_eq!(
            format_schedule(&schedule(Some("20:00"), Some("02:00"), &[6, 0])),
            "20:00 - 02:00 (Cerrado: Dom, Sáb)"
        );
        assert_eq!(
            format_schedule(&schedule(Some("09:00"), None, &[1])),
            "Horario no disponible (Cerrado: Lun)"
        );
    }

    #[test]
    fn validation_is_format_only() {
        assert!(is_valid_schedule("09:00", "17:00"));
        assert!(is_valid_schedule("9:00", "23:59"));
        assert!(is_valid_schedule("10:00", "10:00"));
        assert!(!is_valid_schedule("24:00", "10:00"));
        assert!(!is_valid_schedule("10:60", "11:00"));
        assert!(!is_valid_schedule("10:0", "11:00"));
        assert!(!is_valid_schedule("1000", "11:00"));
        assert!(!is_valid_schedule("+1:00", "11:00"));
    }

    #[test]
    fn closed_days_parse_and_format() {
        let days = parse_closed_days(" 6, 0 ").unwrap();
        assert_eq!(format_closed_days(&days), "0,6");
        assert!(parse_closed_days("").unwrap().is_empty());
        assert!(parse_closed_days("7").is_err());
        assert!(parse_closed_days("lunes").is_err());
        assert!(parse_closed_days("1,,2").is_err());
    }

    #[test]
    fn schedule_update_requires_both_times() {
        let update = UpdateSchedule {
            open_time: Some("8:30".to_string()),
            close_time: Some("01:00".to_string()),
            closed_days: Some("1".to_string()),
        };
        let saved = validate_schedule_update(&update).unwrap();
        assert_eq!(saved.open_time.as_deref(), Some("08:30"));
        assert_eq!(saved.closed_days.len(), 1);

        let half = UpdateSchedule {
            open_time: Some("08:30".to_string()),
            ..Default::default()
        };
        assert!(validate_schedule_update(&half).is_err());
    }

    #[test]
    fn summary_reports_minutes_only_when_closed() {
        let s = schedule(Some("08:00"), Some("16:00"), &[]);
        let closed = summarize(s.clone(), at(3, 7, 30));
        assert!(!closed.is_open);
        assert_eq!(closed.minutes_until_open, Some(30));

        let open = summarize(s, at(3, 9, 0));
        assert!(open.is_open);
        assert_eq!(open.minutes_until_open, None);
    }
}
