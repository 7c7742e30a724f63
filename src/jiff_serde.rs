//! Bing's compact timestamps (`202410030700`, `20241003`), read in the system time zone

use jiff::{tz::TimeZone, Zoned};
use serde::{de, ser};

type Parse = fn(&str, &str) -> Result<Zoned, jiff::Error>;

struct Visitor {
    format: &'static str,
    parse: Parse,
}

impl de::Visitor<'_> for Visitor {
    type Value = Zoned;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "a string formatted as {}", self.format)
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        (self.parse)(self.format, v).map_err(de::Error::custom)
    }
}

fn deserialize<'de, D: de::Deserializer<'de>>(
    d: D,
    format: &'static str,
    parse: Parse,
) -> Result<Zoned, D::Error> {
    d.deserialize_str(Visitor { format, parse })
}

fn serialize<S: ser::Serializer>(
    value: &Zoned,
    serializer: S,
    format: &'static str,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&jiff::fmt::strtime::format(format, value).map_err(ser::Error::custom)?)
}

pub mod datetime {
    use jiff::{civil::DateTime, Zoned};
    use serde::{de, ser};

    const FORMAT: &str = "%Y%m%d%H%M";

    fn parse(format: &str, v: &str) -> Result<Zoned, jiff::Error> {
        DateTime::strptime(format, v).and_then(|x| x.to_zoned(super::TimeZone::system()))
    }

    pub fn deserialize<'de, D: de::Deserializer<'de>>(d: D) -> Result<Zoned, D::Error> {
        super::deserialize(d, FORMAT, parse)
    }

    pub fn serialize<S: ser::Serializer>(value: &Zoned, serializer: S) -> Result<S::Ok, S::Error> {
        super::serialize(value, serializer, FORMAT)
    }
}

pub mod date {
    use jiff::{civil::Date, Zoned};
    use serde::{de, ser};

    const FORMAT: &str = "%Y%m%d";

    fn parse(format: &str, v: &str) -> Result<Zoned, jiff::Error> {
        Date::strptime(format, v).and_then(|x| x.to_zoned(super::TimeZone::system()))
    }

    pub fn deserialize<'de, D: de::Deserializer<'de>>(d: D) -> Result<Zoned, D::Error> {
        super::deserialize(d, FORMAT, parse)
    }

    pub fn serialize<S: ser::Serializer>(value: &Zoned, serializer: S) -> Result<S::Ok, S::Error> {
        super::serialize(value, serializer, FORMAT)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, Serialize)]
    struct Stamped {
        #[serde(with = "super::datetime")]
        start: jiff::Zoned,
        #[serde(with = "super::date")]
        end: jiff::Zoned,
    }

    #[test]
    fn keeps_bing_formats() {
        let json = r#"{"start":"202410030700","end":"20241004"}"#;
        let stamped: Stamped = serde_json::from_str(json).unwrap();

        assert_eq!(7, stamped.start.hour());
        assert_eq!(4, stamped.end.day());
        assert_eq!(json, serde_json::to_string(&stamped).unwrap());
    }

    #[test]
    fn rejects_other_formats() {
        assert!(
            serde_json::from_str::<Stamped>(r#"{"start":"2024-10-03","end":"20241004"}"#).is_err()
        );
    }
}
