//! X.509 validity times kept as calendar fields.

use embtls_types::Asn1Error;

/// A UTC calendar time decoded from UTCTime or GeneralizedTime.
///
/// Field order makes the derived `Ord` a calendar comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Asn1Time {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

fn digits(s: &[u8]) -> Result<u16, Asn1Error> {
    s.iter().try_fold(0u16, |acc, &c| {
        if c.is_ascii_digit() {
            Ok(acc * 10 + (c - b'0') as u16)
        } else {
            Err(Asn1Error::InvalidData("non-digit in time"))
        }
    })
}

impl Asn1Time {
    /// Parse UTCTime `YYMMDDHHMM[SS]Z`. Years 00-49 map to 20xx, 50-99 to 19xx.
    pub fn parse_utc(s: &[u8]) -> Result<Self, Asn1Error> {
        let body = s.strip_suffix(b"Z").ok_or(Asn1Error::InvalidData("time not in UTC"))?;
        if body.len() != 10 && body.len() != 12 {
            return Err(Asn1Error::InvalidLength);
        }
        let yy = digits(&body[0..2])?;
        let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
        Self::from_fields(year, &body[2..])
    }

    /// Parse GeneralizedTime `YYYYMMDDHHMMSSZ`.
    pub fn parse_generalized(s: &[u8]) -> Result<Self, Asn1Error> {
        let body = s.strip_suffix(b"Z").ok_or(Asn1Error::InvalidData("time not in UTC"))?;
        if body.len() != 14 {
            return Err(Asn1Error::InvalidLength);
        }
        Self::from_fields(digits(&body[0..4])?, &body[4..])
    }

    /// `rest` holds MMDDHHMM with optional SS.
    fn from_fields(year: u16, rest: &[u8]) -> Result<Self, Asn1Error> {
        let second = if rest.len() == 10 {
            digits(&rest[8..10])? as u8
        } else {
            0
        };
        let t = Asn1Time {
            year,
            month: digits(&rest[0..2])? as u8,
            day: digits(&rest[2..4])? as u8,
            hour: digits(&rest[4..6])? as u8,
            minute: digits(&rest[6..8])? as u8,
            second,
        };
        if !(1..=12).contains(&t.month)
            || !(1..=31).contains(&t.day)
            || t.hour > 23
            || t.minute > 59
            || t.second > 59
        {
            return Err(Asn1Error::InvalidData("time field out of range"));
        }
        Ok(t)
    }

    /// Convert seconds since the UNIX epoch to calendar fields.
    pub fn from_unix(timestamp: i64) -> Self {
        let days = timestamp.div_euclid(86_400);
        let secs = timestamp.rem_euclid(86_400);

        // civil-from-days (Howard Hinnant)
        let z = days + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z.rem_euclid(146_097);
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + i64::from(month <= 2);

        Asn1Time {
            year: year.clamp(0, u16::MAX as i64) as u16,
            month: month as u8,
            day: day as u8,
            hour: (secs / 3600) as u8,
            minute: (secs % 3600 / 60) as u8,
            second: (secs % 60) as u8,
        }
    }

    /// Seconds since the UNIX epoch.
    pub fn to_unix(&self) -> i64 {
        let (month, day) = (self.month as i64, self.day as i64);
        let y = self.year as i64 - i64::from(month <= 2);
        let era = y.div_euclid(400);
        let yoe = y.rem_euclid(400);
        let mp = (month + 9) % 12;
        let doy = (153 * mp + 2) / 5 + day - 1;
        let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
        let days = era * 146_097 + doe - 719_468;
        days * 86_400 + self.hour as i64 * 3600 + self.minute as i64 * 60 + self.second as i64
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self::from_unix(secs)
    }

    /// Format as UTCTime (years 1950-2049) or GeneralizedTime.
    pub fn to_der_string(&self) -> (u8, String) {
        let tail = format!(
            "{:02}{:02}{:02}{:02}{:02}Z",
            self.month, self.day, self.hour, self.minute, self.second
        );
        if (1950..2050).contains(&self.year) {
            (super::tags::UTC_TIME, format!("{:02}{tail}", self.year % 100))
        } else {
            (super::tags::GENERALIZED_TIME, format!("{:04}{tail}", self.year))
        }
    }
}

impl std::fmt::Display for Asn1Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
