/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Supplies tracked file content to [`dirstate::Dirstate::status`] by
//! opening and caching filelogs on demand, the repository-layer
//! implementation of [`dirstate::FileContentSource`].

use std::collections::HashMap;
use std::path::PathBuf;

use config::Config;
use dirstate::FileContentSource;
use revlog::Filelog;
use types::Node;
use types::RepoPath;

pub struct RepoFileSource<'a> {
    store_dir: PathBuf,
    config: &'a Config,
    open: HashMap<RepoPath, Filelog>,
}

impl<'a> RepoFileSource<'a> {
    pub fn new(store_dir: PathBuf, config: &'a Config) -> Self {
        RepoFileSource {
            store_dir,
            config,
            open: HashMap::new(),
        }
    }

    fn filelog(&mut self, path: &RepoPath) -> std::io::Result<&mut Filelog> {
        if !self.open.contains_key(path) {
            let filelog = Filelog::open(&self.store_dir, path, self.config)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            self.open.insert(path.clone(), filelog);
        }
        Ok(self.open.get_mut(path).expect("just inserted"))
    }
}

impl<'a> FileContentSource for RepoFileSource<'a> {
    fn read(&mut self, path: &RepoPath, node: &Node) -> std::io::Result<Vec<u8>> {
        self.filelog(path)?
            .read_content(node)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}
