//! Remote files: transfer edges, drop and discover through the connection.
//!
//! Remote resources are never touched with local filesystem calls. Every
//! remote format shares one drop routine and one discover routine.

use crate::local::{LocalPlugin, local_path};
use ferry_convert::{BoxError, Converter, DropRoutine, EngineBuilder, Params, Plugin, PluginId};
use ferry_remote::Connection;
use ferry_resource::{FormatId, Resource, ResourceType, Schema, Storage};
use std::fs;
use std::sync::Arc;

fn remote_file(resource: &Resource) -> Result<(&Arc<Connection>, &str), BoxError> {
    resource
        .remote_file()
        .ok_or_else(|| format!("{resource} is not a remote file").into())
}

/// Returns the directory part of a remote path, if it has one.
fn remote_parent(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) | None => None,
        Some((parent, _)) => Some(parent),
    }
}

fn put_edge(format: FormatId) -> Converter {
    Converter::new(
        format!("put {format}"),
        ResourceType::local(format),
        ResourceType::remote(format),
        |source, destination, session| {
            let local = local_path(source)?;
            let out = session.target(destination)?;
            let (connection, path) = remote_file(&out)?;
            if let Some(parent) = remote_parent(path) {
                connection.create_dir(parent)?;
            }
            connection.put(local, path)?;
            tracing::debug!(from = %local.display(), to = %out, "uploaded");
            Ok(out)
        },
    )
}

fn get_edge(format: FormatId) -> Converter {
    Converter::new(
        format!("get {format}"),
        ResourceType::remote(format),
        ResourceType::local(format),
        |source, destination, session| {
            let (connection, path) = remote_file(source)?;
            let out = session.target(destination)?;
            let local = local_path(&out)?;
            if let Some(parent) = local.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            connection.get(path, local)?;
            tracing::debug!(from = %source, to = %local.display(), "downloaded");
            Ok(out)
        },
    )
}

fn remove_remote(resource: &Resource) -> Result<(), BoxError> {
    let (connection, path) = remote_file(resource)?;
    match connection.remove(path) {
        Ok(()) => Ok(()),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Registers remote-file support.
///
/// At ready time, for every codec format `F`, adds `local(F) -> remote(F)`
/// (put) and `remote(F) -> local(F)` (get). Format changes on the way to or
/// from a remote host are planned through local staging.
#[derive(Debug, Default)]
pub struct RemotePlugin;

impl Plugin for RemotePlugin {
    fn build(&self, builder: &mut EngineBuilder) {
        builder
            .register_drop_for_storage(
                Storage::Remote,
                DropRoutine::new("remote", |resource, _| remove_remote(resource)),
            )
            .register_discover_for_storage(Storage::Remote, |resource, engine| {
                let (connection, path) = remote_file(resource)?;
                let bytes = connection.read(path)?;
                let codec = engine.codecs().require(resource.format())?;
                let records = codec.decode(&bytes, &Params::new())?;
                Ok(Schema::infer(&records))
            });
    }

    fn ready(&self, builder: &mut EngineBuilder) {
        let formats: Vec<FormatId> = builder.codecs().formats().collect();
        for format in formats {
            builder
                .register_converter(put_edge(format))
                .register_converter(get_edge(format));
        }
    }

    fn dependencies(&self) -> Vec<PluginId> {
        vec![PluginId::of::<LocalPlugin>()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_of_remote_paths() {
        assert_eq!(remote_parent("/tmp/a.csv"), Some("/tmp"));
        assert_eq!(remote_parent("data/x/a.csv"), Some("data/x"));
        assert_eq!(remote_parent("/a.csv"), None);
        assert_eq!(remote_parent("a.csv"), None);
    }
}
