use {
    crate::{CfnError, PolicyDocument, Resource, Stack},
    log::debug,
    std::{
        cell::RefCell,
        collections::HashMap,
        fmt::Debug,
        fs::{self, File},
        io,
        path::{Path, PathBuf},
        sync::Arc,
    },
    zip::{result::ZipError, write::FileOptions, CompressionMethod, DateTime, ZipWriter},
};

/// A unit of composition that expands into one or more resources.
///
/// Constructs hold configuration only. A [Stack] calls [Construct::resources] exactly once, when the construct is
/// added, and inserts the results into its template. Expansion must be deterministic so that a stack added into
/// another stack can expand the same construct again in the parent's context.
pub trait Construct: Debug + Send + Sync {
    /// The human-readable name of this construct. Also determines its staging namespace.
    fn name(&self) -> &str;

    /// Produce the resources for this construct in the context of `stack`.
    fn resources(&self, stack: &Stack) -> Result<Vec<Resource>, CfnError>;

    /// The permissions CloudFormation needs to create, update, and delete this construct's resources.
    fn cfn_policy_document(&self, _stack: &Stack) -> PolicyDocument {
        PolicyDocument::new()
    }

    /// Write any local data (e.g. function code) that must be uploaded alongside the template.
    fn create_data_dir(&self, _data_dir: &DataDir) -> Result<(), CfnError> {
        Ok(())
    }
}

/// An entry in a stack's provenance log: the item as it was added, before expansion.
#[derive(Clone, Debug)]
pub enum StackItem {
    Resource(Resource),
    Construct(Arc<dyn Construct>),
}

impl StackItem {
    /// The construct, if this item is one.
    pub fn as_construct(&self) -> Option<&Arc<dyn Construct>> {
        match self {
            Self::Construct(c) => Some(c),
            Self::Resource(_) => None,
        }
    }
}

/// Anything that can be added to a [Stack].
#[derive(Debug)]
pub enum Element {
    Resource(Resource),
    Construct(Arc<dyn Construct>),

    /// Another stack; its provenance log is replayed into the receiving stack.
    Stack(Stack),
}

impl From<Resource> for Element {
    fn from(resource: Resource) -> Self {
        Self::Resource(resource)
    }
}

impl From<Arc<dyn Construct>> for Element {
    fn from(construct: Arc<dyn Construct>) -> Self {
        Self::Construct(construct)
    }
}

impl From<Stack> for Element {
    fn from(stack: Stack) -> Self {
        Self::Stack(stack)
    }
}

impl From<&Stack> for Element {
    fn from(stack: &Stack) -> Self {
        Self::Stack(stack.clone())
    }
}

impl From<StackItem> for Element {
    fn from(item: StackItem) -> Self {
        match item {
            StackItem::Resource(r) => Self::Resource(r),
            StackItem::Construct(c) => Self::Construct(c),
        }
    }
}

/// Claims on staging namespaces, shared by every [DataDir] handed out during one staging run. Owners are identified by
/// the address of the construct they stage.
#[derive(Debug, Default)]
pub(crate) struct StagingClaims {
    owners: RefCell<HashMap<String, usize>>,
}

/// A construct's private staging directory, `<root>/<Namespace>`.
///
/// The directory is not created until the construct asks for it, so constructs with nothing to stage leave no trace.
#[derive(Debug)]
pub struct DataDir<'a> {
    namespace: String,
    path: PathBuf,
    owner: usize,
    claims: &'a StagingClaims,
}

impl<'a> DataDir<'a> {
    pub(crate) fn new(root: &Path, namespace: String, owner: usize, claims: &'a StagingClaims) -> Self {
        let path = root.join(&namespace);
        Self {
            namespace,
            path,
            owner,
            claims,
        }
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether this directory has been materialized.
    pub fn is_created(&self) -> bool {
        self.claims.owners.borrow().get(&self.namespace) == Some(&self.owner)
    }

    /// The directory path, creating it on first use.
    pub fn path(&self) -> Result<&Path, CfnError> {
        {
            let mut owners = self.claims.owners.borrow_mut();
            match owners.get(&self.namespace) {
                Some(&owner) if owner == self.owner => return Ok(&self.path),
                Some(_) => return Err(CfnError::StagingConflict(self.namespace.clone())),
                None => {
                    owners.insert(self.namespace.clone(), self.owner);
                }
            }
        }

        debug!("Creating staging directory {}", self.path.display());
        fs::create_dir_all(&self.path).map_err(|e| CfnError::staging_io(&self.path, e))?;
        Ok(&self.path)
    }

    /// Write `contents` to `file_name` inside the directory.
    pub fn write_file<C: AsRef<[u8]>>(&self, file_name: &str, contents: C) -> Result<PathBuf, CfnError> {
        let path = self.path()?.join(file_name);
        fs::write(&path, contents).map_err(|e| CfnError::staging_io(&path, e))?;
        Ok(path)
    }

    /// Recursively copy the contents of `source` into the directory.
    pub fn copy_dir(&self, source: &Path) -> Result<(), CfnError> {
        let dest = self.path()?;
        copy_tree(source, dest)
    }

    /// Zip the contents of `source` into `file_name` inside the directory, returning the archive's path.
    ///
    /// Entries are written in name order with a fixed timestamp, so the same tree always produces the same archive.
    pub fn archive_dir(&self, source: &Path, file_name: &str) -> Result<PathBuf, CfnError> {
        let path = self.path()?.join(file_name);
        let file = File::create(&path).map_err(|e| CfnError::staging_io(&path, e))?;
        let mut writer = ZipWriter::new(file);
        zip_tree(&mut writer, source, "", &path)?;
        writer.finish().map_err(|e| zip_error(&path, e))?;
        Ok(path)
    }
}

fn copy_tree(source: &Path, dest: &Path) -> Result<(), CfnError> {
    let entries = fs::read_dir(source).map_err(|e| CfnError::staging_io(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CfnError::staging_io(source, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| CfnError::staging_io(&from, e))?;

        if file_type.is_dir() {
            fs::create_dir_all(&to).map_err(|e| CfnError::staging_io(&to, e))?;
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| CfnError::staging_io(&to, e))?;
        }
    }
    Ok(())
}

fn zip_tree(writer: &mut ZipWriter<File>, source: &Path, prefix: &str, archive: &Path) -> Result<(), CfnError> {
    let mut entries = fs::read_dir(source)
        .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
        .map_err(|e| CfnError::staging_io(source, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    let options =
        FileOptions::default().compression_method(CompressionMethod::Deflated).last_modified_time(DateTime::default());

    for entry in entries {
        let from = entry.path();
        let name = format!("{}{}", prefix, entry.file_name().to_string_lossy());
        let file_type = entry.file_type().map_err(|e| CfnError::staging_io(&from, e))?;

        if file_type.is_dir() {
            let dir = format!("{}/", name);
            writer.add_directory(dir.as_str(), options).map_err(|e| zip_error(archive, e))?;
            zip_tree(writer, &from, &dir, archive)?;
        } else {
            writer.start_file(name.as_str(), options.unix_permissions(0o644)).map_err(|e| zip_error(archive, e))?;
            let mut input = File::open(&from).map_err(|e| CfnError::staging_io(&from, e))?;
            io::copy(&mut input, writer).map_err(|e| CfnError::staging_io(archive, e))?;
        }
    }
    Ok(())
}

fn zip_error(path: &Path, e: ZipError) -> CfnError {
    match e {
        ZipError::Io(e) => CfnError::staging_io(path, e),
        e => CfnError::StagingIo {
            path: path.to_path_buf(),
            kind: io::ErrorKind::Other,
            message: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{DataDir, StagingClaims},
        crate::CfnError,
        pretty_assertions::assert_eq,
        std::{
            fs::{self, File},
            io::{self, Read},
        },
        zip::ZipArchive,
    };

    #[test_log::test]
    fn test_lazy_creation() {
        let root = tempfile::tempdir().unwrap();
        let claims = StagingClaims::default();
        let dd = DataDir::new(root.path(), "Mypylambda".to_string(), 0, &claims);
        assert_eq!(dd.namespace(), "Mypylambda");
        assert!(!dd.is_created());
        assert!(!root.path().join("Mypylambda").exists());

        let path = dd.write_file("index.py", "def handler(event, context): pass\n").unwrap();
        assert!(dd.is_created());
        assert_eq!(path, root.path().join("Mypylambda").join("index.py"));
        assert_eq!(fs::read_to_string(path).unwrap(), "def handler(event, context): pass\n");
    }

    #[test_log::test]
    fn test_conflict() {
        let root = tempfile::tempdir().unwrap();
        let claims = StagingClaims::default();
        let first = DataDir::new(root.path(), "Shared".to_string(), 0, &claims);
        let second = DataDir::new(root.path(), "Shared".to_string(), 1, &claims);
        let other = DataDir::new(root.path(), "Other".to_string(), 1, &claims);

        first.path().unwrap();
        first.path().unwrap();
        assert_eq!(second.path().unwrap_err(), CfnError::StagingConflict("Shared".to_string()));
        assert!(!second.is_created());
        other.path().unwrap();
    }

    #[test_log::test]
    fn test_copy_dir() {
        let source = tempfile::tempdir().unwrap();
        fs::write(source.path().join("index.py"), "print('hi')\n").unwrap();
        fs::create_dir(source.path().join("lib")).unwrap();
        fs::write(source.path().join("lib").join("util.py"), "X = 1\n").unwrap();

        let root = tempfile::tempdir().unwrap();
        let claims = StagingClaims::default();
        let dd = DataDir::new(root.path(), "Fn".to_string(), 0, &claims);
        dd.copy_dir(source.path()).unwrap();
        assert_eq!(fs::read_to_string(root.path().join("Fn/lib/util.py")).unwrap(), "X = 1\n");
        assert_eq!(fs::read_to_string(root.path().join("Fn/index.py")).unwrap(), "print('hi')\n");

        let e = dd.copy_dir(&source.path().join("missing")).unwrap_err();
        match e {
            CfnError::StagingIo {
                kind,
                ..
            } => assert_eq!(kind, io::ErrorKind::NotFound),
            _ => panic!("Unexpected error: {:?}", e),
        }
    }

    #[test_log::test]
    fn test_archive_dir() {
        let source = tempfile::tempdir().unwrap();
        fs::write(source.path().join("index.py"), "print('hi')\n").unwrap();
        fs::create_dir(source.path().join("lib")).unwrap();
        fs::write(source.path().join("lib").join("util.py"), "X = 1\n").unwrap();

        let root = tempfile::tempdir().unwrap();
        let claims = StagingClaims::default();
        let dd = DataDir::new(root.path(), "Fn".to_string(), 0, &claims);
        let path = dd.archive_dir(source.path(), "code.zip").unwrap();
        assert_eq!(path, root.path().join("Fn").join("code.zip"));

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len()).map(|i| archive.by_index(i).unwrap().name().to_string()).collect();
        assert_eq!(names, vec!["index.py", "lib/", "lib/util.py"]);

        let mut contents = String::new();
        archive.by_name("lib/util.py").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "X = 1\n");

        let again = dd.archive_dir(source.path(), "again.zip").unwrap();
        assert_eq!(fs::read(&path).unwrap(), fs::read(again).unwrap());

        let e = dd.archive_dir(&source.path().join("missing"), "missing.zip").unwrap_err();
        match e {
            CfnError::StagingIo {
                kind,
                ..
            } => assert_eq!(kind, io::ErrorKind::NotFound),
            _ => panic!("Unexpected error: {:?}", e),
        }
    }
}
