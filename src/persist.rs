//! Deterministic binary serialization of a trained [`crate::VocabTree`].
//!
//! The wire layout matches the documented contract byte-for-byte from the
//! `split : u32` field onward: `split`, `maxLevel`, `numberOfNodes`,
//! `weights[N]`, the database vectors, the inverted files, then the nodes
//! themselves (each with an OpenCV-style matrix header ahead of its raw
//! centroid bytes). Ahead of that legacy payload this crate writes a
//! 4-byte magic and a `u32` format version, and `load` still accepts a
//! stream with neither (see DESIGN.md, "Endianness & versioning").

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array1;

use crate::error::{Result, VocabTreeError};
use crate::tree::{TreeNode, NO_CHILD};
use crate::VocabTree;

const MAGIC: &[u8; 4] = b"VTR1";
const FORMAT_VERSION: u32 = 1;

/// OpenCV's `CV_32FC1` type tag, preserved for bit-compatibility with the
/// matrix header the original engine wrote ahead of each node's centroid.
const ELEM_TYPE_F32: i32 = 5;

impl VocabTree {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        self.write_payload(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        read_payload(&mut reader).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                VocabTreeError::Corrupt(format!("truncated vocabulary tree stream: {}", e))
            } else {
                VocabTreeError::Io(e)
            }
        })
    }

    fn write_payload<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let number_of_nodes = self.tree.len() as u32;

        w.write_u32::<LittleEndian>(self.split)?;
        w.write_u32::<LittleEndian>(self.max_level)?;
        w.write_u32::<LittleEndian>(number_of_nodes)?;

        for &weight in self.weights.iter() {
            w.write_f32::<LittleEndian>(weight)?;
        }

        w.write_u32::<LittleEndian>(self.database_vectors.len() as u32)?;
        for (&image_id, vector) in &self.database_vectors {
            w.write_u64::<LittleEndian>(image_id)?;
            for &v in vector.iter() {
                w.write_f32::<LittleEndian>(v)?;
            }
        }

        w.write_u32::<LittleEndian>(self.inverted_files.len() as u32)?;
        for file in &self.inverted_files {
            w.write_u32::<LittleEndian>(file.len() as u32)?;
            for (&image_id, &count) in file {
                w.write_u64::<LittleEndian>(image_id)?;
                w.write_u32::<LittleEndian>(count)?;
            }
        }

        for node in &self.tree {
            w.write_u32::<LittleEndian>(node.first_child_index.unwrap_or(NO_CHILD))?;
            w.write_u32::<LittleEndian>(node.index)?;
            w.write_u32::<LittleEndian>(node.inverted_file_length)?;
            w.write_u32::<LittleEndian>(node.level)?;
            w.write_u32::<LittleEndian>(node.level_index)?;

            // cv::Mat-style header: elem_size, elem_type, rows, cols.
            w.write_u64::<LittleEndian>(std::mem::size_of::<f32>() as u64)?;
            w.write_i32::<LittleEndian>(ELEM_TYPE_F32)?;
            w.write_u32::<LittleEndian>(1)?; // rows
            w.write_u32::<LittleEndian>(node.mean.len() as u32)?;
            for &v in node.mean.iter() {
                w.write_f32::<LittleEndian>(v)?;
            }
        }

        Ok(())
    }
}

fn read_payload<R: Read>(r: &mut R) -> io::Result<VocabTree> {
    let mut magic_buf = [0u8; 4];
    r.read_exact(&mut magic_buf)?;
    let split = if &magic_buf == MAGIC {
        let _version = r.read_u32::<LittleEndian>()?;
        r.read_u32::<LittleEndian>()?
    } else {
        u32::from_le_bytes(magic_buf)
    };

    let max_level = r.read_u32::<LittleEndian>()?;
    let number_of_nodes = r.read_u32::<LittleEndian>()?;

    let mut weights = Array1::<f32>::zeros(number_of_nodes as usize);
    for w in weights.iter_mut() {
        *w = r.read_f32::<LittleEndian>()?;
    }

    let database_vector_count = r.read_u32::<LittleEndian>()?;
    let mut database_vectors = HashMap::with_capacity(database_vector_count as usize);
    for _ in 0..database_vector_count {
        let image_id = r.read_u64::<LittleEndian>()?;
        let mut vector = Array1::<f32>::zeros(number_of_nodes as usize);
        for v in vector.iter_mut() {
            *v = r.read_f32::<LittleEndian>()?;
        }
        database_vectors.insert(image_id, vector);
    }

    let inverted_file_count = r.read_u32::<LittleEndian>()?;
    let mut inverted_files = Vec::with_capacity(inverted_file_count as usize);
    for _ in 0..inverted_file_count {
        let size = r.read_u32::<LittleEndian>()?;
        let mut file = HashMap::with_capacity(size as usize);
        for _ in 0..size {
            let image_id = r.read_u64::<LittleEndian>()?;
            let count = r.read_u32::<LittleEndian>()?;
            file.insert(image_id, count);
        }
        inverted_files.push(file);
    }

    let mut tree = Vec::with_capacity(number_of_nodes as usize);
    for _ in 0..number_of_nodes {
        let first_child_raw = r.read_u32::<LittleEndian>()?;
        let index = r.read_u32::<LittleEndian>()?;
        let inverted_file_length = r.read_u32::<LittleEndian>()?;
        let level = r.read_u32::<LittleEndian>()?;
        let level_index = r.read_u32::<LittleEndian>()?;

        let _elem_size = r.read_u64::<LittleEndian>()?;
        let _elem_type = r.read_i32::<LittleEndian>()?;
        let rows = r.read_u32::<LittleEndian>()?;
        let cols = r.read_u32::<LittleEndian>()?;
        let mut mean = Array1::<f32>::zeros((rows as usize) * (cols as usize));
        for v in mean.iter_mut() {
            *v = r.read_f32::<LittleEndian>()?;
        }

        tree.push(TreeNode {
            level,
            level_index,
            first_child_index: if first_child_raw == NO_CHILD {
                None
            } else {
                Some(first_child_raw)
            },
            index,
            inverted_file_length,
            mean,
        });
    }

    Ok(VocabTree {
        split,
        max_level,
        tree,
        weights,
        database_vectors,
        inverted_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::testing::InMemoryDataset;
    use crate::kmeans::GreedyKMeans;
    use crate::TrainConfig;
    use ndarray::array;

    fn trained_tree() -> VocabTree {
        let mut ds = InMemoryDataset::new();
        for id in 0..6u64 {
            let x = (id as f32) * 0.37;
            ds.insert(id, array![[x, 1.0 - x, x * 0.5]]);
        }
        let kmeans = GreedyKMeans::with_seed(123);
        let config = TrainConfig::new(2, 3);
        let ids: Vec<u64> = (0..6).collect();
        VocabTree::train(&ds, &ds, &kmeans, &ids, &config).unwrap()
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let voc = trained_tree();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        voc.save(&path).unwrap();
        let loaded = VocabTree::load(&path).unwrap();
        assert_eq!(voc, loaded);
    }

    #[test]
    fn truncated_file_is_reported_as_corrupt() {
        let voc = trained_tree();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        voc.save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // Cut the stream off partway through the weights section.
        let truncated = &bytes[..bytes.len() / 4];
        std::fs::write(&path, truncated).unwrap();

        match VocabTree::load(&path) {
            Err(VocabTreeError::Corrupt(_)) => {}
            other => panic!("expected Corrupt, got {:?}", other.map(|_| ())),
        }
    }
}
