//! Peer discovery.
//!
//! Scans for nearby discoverable devices and picks the first one whose
//! name matches the configured target exactly.

use std::{pin::pin, time::Duration};

use bluer::{Adapter, AdapterEvent, Address, Session};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use tokio::{select, time};

use crate::{
   config::Config,
   error::{Result, SenderError},
};

/// Source of scan results and device names.
pub trait Scanner {
   /// Scans for nearby devices, returning their addresses in scan order.
   async fn scan(&self) -> Result<Vec<Address>>;

   /// Resolves the human-readable name of `address`, if it has one.
   async fn lookup_name(&self, address: Address) -> Result<Option<String>>;
}

/// Returns the address of the first scanned device named `target`.
pub async fn discover<S: Scanner>(scanner: &S, target: &str) -> Result<Address> {
   info!("Searching for {target}...");
   let addresses = scanner.scan().await?;
   debug!("Scan found {} devices", addresses.len());

   for address in addresses {
      match scanner.lookup_name(address).await {
         Ok(Some(name)) if name == target => {
            info!("Found {target} at {address}");
            return Ok(address);
         },
         Ok(name) => debug!("Skipping {address} ({name:?})"),
         Err(e) => warn!("Name lookup failed for {address}: {e}"),
      }
   }

   Err(SenderError::DeviceNotFound(target.to_owned()))
}

/// Keeps the candidates that reported signal strength during the scan.
///
/// BlueZ also announces devices it merely remembers; those carry no RSSI
/// until they are actually heard.
pub fn in_range(candidates: impl IntoIterator<Item = (Address, Option<i16>)>) -> Vec<Address> {
   candidates
      .into_iter()
      .filter_map(|(addr, rssi)| match rssi {
         Some(_) => Some(addr),
         None => {
            debug!("Skipping {addr}: not heard during scan");
            None
         },
      })
      .collect()
}

/// Scanner backed by a BlueZ adapter.
pub struct BluezScanner {
   adapter: Adapter,
   timeout: Duration,
}

impl BluezScanner {
   /// Opens a BlueZ session and prepares the configured adapter.
   pub async fn new(config: &Config) -> Result<Self> {
      let session = Session::new().await?;
      let adapter = match &config.adapter {
         Some(name) => {
            if !session.adapter_names().await?.contains(name) {
               return Err(SenderError::AdapterNotFound(name.clone()));
            }
            session.adapter(name)?
         },
         None => session.default_adapter().await?,
      };

      let name = adapter.name().to_owned();
      if !adapter.is_powered().await? {
         adapter
            .set_powered(true)
            .await
            .inspect_err(|e| warn!("Failed to power on adapter {name}: {e}"))?;
         info!("Powered on adapter: {name}");
      }
      debug!("Using adapter {name}");

      Ok(Self {
         adapter,
         timeout: config.scan_timeout(),
      })
   }
}

impl Scanner for BluezScanner {
   async fn scan(&self) -> Result<Vec<Address>> {
      let mut events = pin!(self.adapter.discover_devices().await?);
      let mut deadline = pin!(time::sleep(self.timeout));
      let mut found = Vec::new();

      loop {
         select! {
            _ = &mut deadline => break,
            event = events.next() => match event {
               Some(AdapterEvent::DeviceAdded(addr)) => {
                  if !found.contains(&addr) {
                     debug!("Device added: {addr}");
                     found.push(addr);
                  }
               },
               Some(_) => {},
               None => break,
            },
         }
      }

      let mut candidates = Vec::with_capacity(found.len());
      for addr in found {
         // A device removed mid-scan has no properties left to read.
         let rssi = match self.adapter.device(addr) {
            Ok(device) => device.rssi().await.unwrap_or_default(),
            Err(_) => None,
         };
         candidates.push((addr, rssi));
      }
      Ok(in_range(candidates))
   }

   async fn lookup_name(&self, address: Address) -> Result<Option<String>> {
      Ok(self.adapter.device(address)?.name().await?)
   }
}
