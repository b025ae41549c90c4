//! Map synchronization extension point

use async_trait::async_trait;
use edge_shared::messages::MapUpdateMessage;
use edge_shared::AdapterError;
use tracing::{info, warn};

use crate::device::DeviceSupervisor;

/// Occupancy map exported by a robot
#[derive(Debug, Clone, PartialEq)]
pub struct MapSnapshot {
    /// Points as `[x, y, z]` (or `[x, y]`) in meters
    pub pointcloud: Vec<Vec<f64>>,
    pub map_type: String,
    /// Meters per cell
    pub resolution: f64,
}

impl MapSnapshot {
    pub fn point_cloud(pointcloud: Vec<Vec<f64>>) -> Self {
        Self {
            pointcloud,
            map_type: MapUpdateMessage::DEFAULT_MAP_TYPE.into(),
            resolution: MapUpdateMessage::DEFAULT_RESOLUTION,
        }
    }
}

/// Vendor hook that knows how to pull a map off the robot
#[async_trait]
pub trait MapProvider: Send + Sync {
    async fn fetch_map(&self) -> Result<MapSnapshot, AdapterError>;
}

impl DeviceSupervisor {
    /// Push the robot's map to `twin_uuid`; `false` when no provider is
    /// installed or the fetch fails
    pub async fn sync_map(&self, twin_uuid: &str) -> bool {
        let Some(provider) = &self.map_provider else {
            info!("Map sync not implemented for this adapter");
            return false;
        };

        match provider.fetch_map().await {
            Ok(map) => {
                let points = map.pointcloud.len();
                self.core
                    .publish_map_update(twin_uuid, map.pointcloud, &map.map_type, map.resolution)
                    .await;
                info!("Synced map with {} points to twin {}", points, twin_uuid);
                true
            }
            Err(e) => {
                warn!("Map sync failed: {}", e);
                false
            }
        }
    }
}
