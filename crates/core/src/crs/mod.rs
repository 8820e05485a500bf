//! Coordinate Reference System handling

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coordinate Reference System representation
///
/// Only carries identifiers; the actual transformations are delegated to
/// the GDAL/OGR binaries, which receive [`CRS::identifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    wkt: Option<String>,
    epsg: Option<u32>,
    proj: Option<String>,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Whether the EPSG code falls in the geographic 2D range (4000-4999)
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(4000..=4999))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }
        false
    }

    /// Identifier understood by `ogr2ogr -t_srs` and `gdalwarp -t_srs`
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            return wkt.clone();
        }
        "Unknown".to_string()
    }
}

impl FromStr for CRS {
    type Err = Error;

    /// Accepts `EPSG:4326`, `epsg:4326`, a bare code, a PROJ string
    /// (`+proj=...`) or WKT.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let code = s
            .split_once(':')
            .filter(|(auth, _)| auth.eq_ignore_ascii_case("epsg"))
            .map(|(_, code)| code)
            .unwrap_or(s);

        if let Ok(code) = code.parse::<u32>() {
            return Ok(Self::from_epsg(code));
        }
        if s.starts_with("+proj") {
            return Ok(Self::from_proj(s));
        }
        if s.contains('[') {
            return Ok(Self::from_wkt(s));
        }

        Err(Error::InvalidParameter {
            name: "crs",
            value: s.to_string(),
            reason: "expected EPSG:<code>, a PROJ string or WKT".into(),
        })
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.wkt, self.epsg) {
            (Some(wkt), None) => write!(f, "WKT:{}", wkt.chars().take(50).collect::<String>()),
            _ => write!(f, "{}", self.identifier()),
        }
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!("epsg:4326".parse::<CRS>().unwrap(), CRS::wgs84());
        assert_eq!("EPSG:26914".parse::<CRS>().unwrap().epsg(), Some(26914));
        assert_eq!("5070".parse::<CRS>().unwrap().epsg(), Some(5070));
        assert_eq!(
            "+proj=utm +zone=14".parse::<CRS>().unwrap().proj(),
            Some("+proj=utm +zone=14")
        );
        assert!("not a crs".parse::<CRS>().is_err());
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(4326);
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::from_epsg(5070)));
    }
}
