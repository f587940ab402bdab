//! Local files: read/write edges, drop and discover.

use crate::records::RecordsPlugin;
use ferry_convert::{BoxError, Converter, DropRoutine, EngineBuilder, Params, Plugin, PluginId};
use ferry_resource::{FormatId, Resource, ResourceType, Schema, Storage};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub(crate) fn local_path(resource: &Resource) -> Result<&Path, BoxError> {
    resource
        .local_path()
        .ok_or_else(|| format!("{resource} is not a local file").into())
}

fn read_edge(format: FormatId) -> Converter {
    Converter::new(
        format!("read {format}"),
        ResourceType::local(format),
        ResourceType::records(),
        move |source, _, session| {
            let bytes = fs::read(local_path(source)?)?;
            let codec = session.engine().codecs().require(format)?;
            let records = codec.decode(&bytes, session.params())?;
            Ok(Resource::memory(records))
        },
    )
}

fn write_edge(format: FormatId) -> Converter {
    Converter::new(
        format!("write {format}"),
        ResourceType::records(),
        ResourceType::local(format),
        move |source, destination, session| {
            let records = source
                .as_records()
                .ok_or_else(|| format!("{source} is not in memory"))?;
            let codec = session.engine().codecs().require(format)?;
            let bytes = codec.encode(records, session.params())?;
            let out = session.target(destination)?;
            let path = local_path(&out)?;
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, bytes)?;
            Ok(out)
        },
    )
}

fn remove_local(resource: &Resource) -> Result<(), BoxError> {
    match fs::remove_file(local_path(resource)?) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Registers local-file support.
///
/// At ready time, for every codec any plugin registered, adds a
/// `local(F) -> records` edge and a `records -> local(F)` edge.
#[derive(Debug, Default)]
pub struct LocalPlugin;

impl Plugin for LocalPlugin {
    fn build(&self, builder: &mut EngineBuilder) {
        builder
            .register_drop_for_storage(
                Storage::Local,
                DropRoutine::new("local", |resource, _| remove_local(resource)),
            )
            .register_discover_for_storage(Storage::Local, |resource, engine| {
                let bytes = fs::read(local_path(resource)?)?;
                let codec = engine.codecs().require(resource.format())?;
                let records = codec.decode(&bytes, &Params::new())?;
                Ok(Schema::infer(&records))
            });
    }

    fn ready(&self, builder: &mut EngineBuilder) {
        let formats: Vec<FormatId> = builder.codecs().formats().collect();
        for format in formats {
            builder
                .register_converter(read_edge(format))
                .register_converter(write_edge(format));
        }
    }

    fn dependencies(&self) -> Vec<PluginId> {
        vec![PluginId::of::<RecordsPlugin>()]
    }
}
