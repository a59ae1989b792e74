use anyhow::anyhow;
use chrono::{
  DateTime,
  NaiveDate,
  NaiveDateTime,
  SecondsFormat,
  Utc
};
use tracing::warn;

/// Renders a timestamp the way the
/// tasks record stores it:
/// RFC 3339, UTC, millisecond
/// precision.
#[must_use]
pub fn format_iso(
  dt: DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Millis,
    true
  )
}

pub fn parse_iso(
  raw: &str
) -> anyhow::Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(
    raw.trim()
  )
  .map(|dt| dt.with_timezone(&Utc))
  .map_err(|err| {
    anyhow!(
      "invalid ISO-8601 date-time \
       '{raw}': {err}"
    )
  })
}

/// Parses a due date typed by the
/// user. Accepts a full RFC 3339
/// date-time or a bare `YYYY-MM-DD`,
/// which lands on midnight UTC.
#[tracing::instrument]
pub fn parse_due_input(
  raw: &str
) -> anyhow::Result<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(anyhow!(
      "due date cannot be empty"
    ));
  }

  if let Ok(dt) = parse_iso(trimmed) {
    return Ok(dt);
  }

  let date = NaiveDate::parse_from_str(
    trimmed, "%Y-%m-%d"
  )
  .map_err(|_| {
    anyhow!(
      "unrecognized due date \
       '{trimmed}', expected \
       YYYY-MM-DD or an RFC 3339 \
       date-time"
    )
  })?;

  date
    .and_hms_opt(0, 0, 0)
    .map(|ndt| {
      DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc)
    })
    .ok_or_else(|| {
      anyhow!(
        "invalid due date \
         '{trimmed}'"
      )
    })
}

/// Reads a stored `dueDate`. Besides
/// RFC 3339 this takes a date-time
/// without offset (read as UTC) and a
/// bare date. Anything else is `None`.
pub fn parse_stored(
  raw: &str
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(dt) = parse_iso(trimmed) {
    return Some(dt);
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      trimmed,
      "%Y-%m-%dT%H:%M:%S%.f"
    )
  {
    return Some(ndt.and_utc());
  }

  if let Some(ndt) =
    NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
  {
    return Some(ndt.and_utc());
  }

  warn!(
    value = %trimmed,
    "unreadable stored due date, \
     dropping it"
  );
  None
}

pub mod iso_date_serde {
  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          serializer.serialize_str(
            &crate::datetime::format_iso(
              *value
            )
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt = Option::<
        serde_json::Value
      >::deserialize(
        deserializer
      )?;
      Ok(match opt {
        | Some(
          serde_json::Value::String(
            raw
          )
        ) => {
          crate::datetime::parse_stored(
            &raw
          )
        }
        | Some(serde_json::Value::Null)
        | None => None,
        | Some(other) => {
          tracing::warn!(
            value = %other,
            "non-string stored due \
             date, dropping it"
          );
          None
        }
      })
    }
  }
}
