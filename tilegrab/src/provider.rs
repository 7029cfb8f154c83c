//! Tile providers and their URL templates.
//!
//! Every provider is described by a URL template where `{x}`, `{y}` and `{z}` stand for the tile indices, and where an optional
//! bracketed list of literal alternatives such as `[0,1,2,3]` stands for interchangeable mirror hosts. A new alternative is drawn
//! at random on every resolution to spread the load over the mirrors.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use rand::seq::IndexedRandom;
use rand::Rng;
use regex::Regex;

use crate::coord::TileCoord;
use crate::Error;

/// Query suffix asking Google tile servers to drop every label.
pub const GOOGLE_WITHOUT_LABEL_SUFFIX: &str = "&apistyle=s.t%3A0%7Cs.e%3Al%7Cp.v%3Aoff";

static MIRRORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]").unwrap());

/// Rendering options of the requested tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    /// Keep labels on the tiles, only honored by providers supporting it.
    pub with_labels: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self { with_labels: true }
    }
}

/// Supported tile providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// google.com/maps satellite imagery.
    GoogleSatellite,
    /// google.com/maps road map.
    GoogleImage,
    /// google.com/maps terrain map.
    GoogleTerrain,
    /// amap.com satellite imagery.
    AMapSatellite,
    /// amap.com road overlay.
    AMapCover,
    /// amap.com road map.
    AMapImage,
    /// yandex.ru dark road map.
    YMapImage,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Provider::GoogleSatellite,
        Provider::GoogleImage,
        Provider::GoogleTerrain,
        Provider::AMapSatellite,
        Provider::AMapCover,
        Provider::AMapImage,
        Provider::YMapImage,
    ];

    /// Stable provider name, also used as the map type directory name.
    pub fn name(&self) -> &'static str {
        match self {
            Provider::GoogleSatellite => "GoogleSatellite",
            Provider::GoogleImage => "GoogleImage",
            Provider::GoogleTerrain => "GoogleTerrain",
            Provider::AMapSatellite => "AMapSatellite",
            Provider::AMapCover => "AMapCover",
            Provider::AMapImage => "AMapImage",
            Provider::YMapImage => "YMapImage",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            Provider::GoogleSatellite => "http://mt[0,1,2,3].google.com/vt/lyrs=y&x={x}&y={y}&z={z}&s=Gali",
            Provider::GoogleImage => "http://mt[0,1,2,3].google.com/vt/lyrs=m&gl=CN&x={x}&y={y}&z={z}&s=Gali",
            Provider::GoogleTerrain => "http://mt[0,1,2,3].google.com/vt/lyrs=p&gl=CN&x={x}&y={y}&z={z}&s=Gali",
            Provider::AMapSatellite => "http://webst0[1,2,3,4].is.autonavi.com/appmaptile?style=6&x={x}&y={y}&z={z}",
            Provider::AMapCover => "http://webst0[1,2,3,4].is.autonavi.com/appmaptile?x={x}&y={y}&z={z}&lang=zhcn&size=1&scale=1&style=8",
            Provider::AMapImage => "http://webrd0[1,2,3,4].is.autonavi.com/appmaptile?lang=zh_cn&size=1&scale=1&style=8&x={x}&y={y}&z={z}",
            Provider::YMapImage => {
                "https://core-renderer-tiles.maps.yandex.net/tiles?l=map&x={x}&y={y}&z={z}&scale=2&lang=ru_RU&theme=dark"
            }
        }
    }

    /// Whether labels can be toggled off for this provider.
    pub fn supports_labels(&self) -> bool {
        matches!(self, Provider::GoogleSatellite | Provider::GoogleImage | Provider::GoogleTerrain)
    }

    /// Resolve the URL of `coord`, drawing the mirror host from the thread-local generator.
    pub fn resolve(&self, style: Style, coord: TileCoord) -> String {
        self.resolve_with(style, coord, &mut rand::rng())
    }

    /// Resolve the URL of `coord`, drawing the mirror host from `rng`.
    pub fn resolve_with<R: Rng + ?Sized>(&self, style: Style, coord: TileCoord, rng: &mut R) -> String {
        let url = self
            .template()
            .replacen("{x}", &coord.x.to_string(), 1)
            .replacen("{y}", &coord.y.to_string(), 1)
            .replacen("{z}", &coord.z.to_string(), 1);

        let mut url = MIRRORS
            .replace(&url, |caps: &regex::Captures<'_>| {
                let alternatives: Vec<&str> = caps[1].split(',').collect();
                alternatives.choose(&mut *rng).copied().unwrap_or_default().to_owned()
            })
            .into_owned();

        if self.supports_labels() && !style.with_labels {
            url.push_str(GOOGLE_WITHOUT_LABEL_SUFFIX);
        }

        url
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|provider| provider.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownProvider(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const COORD: TileCoord = TileCoord { x: 843, y: 388, z: 10 };

    #[test]
    fn test_no_placeholder_left() {
        for provider in Provider::ALL {
            for with_labels in [true, false] {
                let url = provider.resolve(Style { with_labels }, COORD);

                assert!(!url.contains(['{', '}', '[', ']']), "`{url}` has unresolved parts");
                assert!(url.contains("x=843") && url.contains("y=388") && url.contains("z=10"), "`{url}`");
                assert!(url::Url::parse(&url).is_ok(), "`{url}` is not a valid URL");
            }
        }
    }

    #[test]
    fn test_mirror_distribution() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = HashMap::new();

        for _ in 0..1000 {
            let url = Provider::GoogleSatellite.resolve_with(Style::default(), COORD, &mut rng);
            let host = url.strip_prefix("http://mt").and_then(|rest| rest.split_once('.')).unwrap().0.to_owned();
            *counts.entry(host).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 4, "{counts:?}");
        for mirror in ["0", "1", "2", "3"] {
            let count = counts[mirror];
            assert!((175..=325).contains(&count), "mirror {mirror} drawn {count} times out of 1000");
        }
    }

    #[test]
    fn test_label_suffix() {
        let without = Provider::GoogleTerrain.resolve(Style { with_labels: false }, COORD);
        assert!(without.ends_with(GOOGLE_WITHOUT_LABEL_SUFFIX));

        let with = Provider::GoogleTerrain.resolve(Style { with_labels: true }, COORD);
        assert!(!with.contains("apistyle"));

        // ignored by providers without label support
        let amap = Provider::AMapSatellite.resolve(Style { with_labels: false }, COORD);
        assert!(!amap.contains("apistyle"));
    }

    #[test]
    fn test_template_without_mirrors() {
        let url = Provider::YMapImage.resolve(Style::default(), COORD);

        assert_eq!(
            url,
            "https://core-renderer-tiles.maps.yandex.net/tiles?l=map&x=843&y=388&z=10&scale=2&lang=ru_RU&theme=dark"
        );
    }

    #[test]
    fn test_amap_mirror_hosts() {
        let url = Provider::AMapImage.resolve(Style::default(), COORD);
        let host = url::Url::parse(&url).unwrap().host_str().unwrap().to_owned();

        assert!(["webrd01", "webrd02", "webrd03", "webrd04"].iter().any(|prefix| host.starts_with(prefix)), "{host}");
    }

    #[test]
    fn test_parse_provider() {
        for provider in Provider::ALL {
            assert_eq!(provider.name().parse::<Provider>().unwrap(), provider);
        }
        assert_eq!("googlesatellite".parse::<Provider>().unwrap(), Provider::GoogleSatellite);
        assert!(matches!("OpenStreetMap".parse::<Provider>(), Err(Error::UnknownProvider(name)) if name == "OpenStreetMap"));
    }
}
