//! Environment-driven configuration for the tool-call surface.

use std::net::SocketAddr;
use std::path::PathBuf;

use mag_map::MapFormat;
use nav_common::{NavError, NavResult};
use nav_ekf::FilterConfig;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8091";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub map_path: Option<PathBuf>,
    pub map_format: Option<MapFormat>,
    pub tile_size: usize,
    pub tile_cache_capacity: usize,
    pub filter: FilterConfig,
    pub listen_addr: SocketAddr,
    pub default_dt_s: f64,
}

impl AppConfig {
    pub fn from_env() -> NavResult<Self> {
        let map_path = std::env::var("QMAG_NAV_MAP_PATH").ok().map(PathBuf::from);

        let map_format = match std::env::var("QMAG_NAV_MAP_FORMAT").ok().as_deref() {
            None => None,
            Some("geotiff") => Some(MapFormat::GeoTiff),
            Some("netcdf") => Some(MapFormat::NetCdf),
            Some(other) => {
                return Err(NavError::Config(format!(
                    "QMAG_NAV_MAP_FORMAT must be 'geotiff' or 'netcdf', got {other:?}"
                )))
            }
        };

        let tile_size = env_parse("QMAG_NAV_TILE_SIZE", mag_map::DEFAULT_TILE_SIZE)?;
        let tile_cache_capacity = env_parse(
            "QMAG_NAV_TILE_CACHE_CAPACITY",
            mag_map::DEFAULT_TILE_CACHE_CAPACITY,
        )?;

        let mut filter = FilterConfig::default();
        filter.qp = env_parse("QMAG_NAV_FILTER_QP", filter.qp)?;
        filter.qv = env_parse("QMAG_NAV_FILTER_QV", filter.qv)?;
        filter.h_step = env_parse("QMAG_NAV_FILTER_H_STEP", filter.h_step)?;

        let listen_addr_str = std::env::var("QMAG_NAV_TOOLS_LISTEN_ADDR")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr_str.parse().map_err(|e| {
            NavError::Config(format!(
                "invalid QMAG_NAV_TOOLS_LISTEN_ADDR {listen_addr_str:?}: {e}"
            ))
        })?;

        Ok(Self {
            map_path,
            map_format,
            tile_size,
            tile_cache_capacity,
            filter,
            listen_addr,
            default_dt_s: 1.0,
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> NavResult<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|e| NavError::Config(format!("invalid {name} {raw:?}: {e}"))),
    }
}
