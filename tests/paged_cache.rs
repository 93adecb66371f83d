//! Integration tests for paged KV cache offsets and the backward block walk.

use kvaddr::reference::{CacheStrides, gather_batch};
use kvaddr::seqlens::cumulative_from_lengths;
use kvaddr::{
    AddressingConfig, BlockInfo, BlockTable, KeyLayout, LaunchParams, PageTable, PagedCache,
};

/// Deterministic pseudo-random page ids in `0..num_pages`.
fn det_pages(count: usize, num_pages: usize, seed: usize) -> Vec<i32> {
    (0..count)
        .map(|i| ((i * 7 + seed * 13 + 3) % num_pages) as i32)
        .collect()
}

#[test]
fn test_scenario_page_table_lookup() {
    let table = [2, 0, 1, 1, 2, 0];
    let cfg = AddressingConfig::padded(1, 48).with_paged_cache(PagedCache::new(&table, 3, 64));
    let bi = BlockInfo::try_new(&cfg, 1).unwrap();
    assert_eq!(bi.try_paged_key_offset(0, 1, 1, 2, 16).unwrap(), 0);
    assert_eq!(bi.try_paged_key_advance(1, 2, 1, 16).unwrap(), (2 - 0) * 64);
}

#[test]
fn test_identity_table_matches_contiguous() {
    let (batch, pages_per_seq, page_len, row_stride) = (3usize, 4usize, 16i64, 8i64);
    let batch_stride = pages_per_seq as i64 * page_len * row_stride;

    // Physical page b * pages_per_seq + p holds logical page p of sequence b,
    // which is where a contiguous cache with this batch stride puts it.
    let table: Vec<i32> = (0..(batch * pages_per_seq) as i32).collect();
    let contiguous = AddressingConfig::padded(1, 64);
    let paged = contiguous.with_paged_cache(PagedCache::new(
        &table,
        pages_per_seq,
        page_len * row_stride,
    ));

    for b in 0..batch {
        let c = BlockInfo::try_new(&contiguous, b).unwrap();
        let p = BlockInfo::try_new(&paged, b).unwrap();
        for block in 0..pages_per_seq {
            assert_eq!(
                c.try_paged_key_offset(batch_stride, row_stride, b, block, page_len).unwrap(),
                p.try_paged_key_offset(batch_stride, row_stride, b, block, page_len).unwrap(),
            );
            if block > 0 {
                assert_eq!(
                    c.try_paged_key_advance(b, block, row_stride, page_len).unwrap(),
                    p.try_paged_key_advance(b, block, row_stride, page_len).unwrap(),
                );
            }
        }
    }
}

#[test]
fn test_identity_per_row_table_matches_contiguous_within_row() {
    // table[b, p] == p: every sequence sees pages 0.. from the same base.
    let table = [0, 1, 2, 0, 1, 2];
    let (page_len, row_stride) = (4i64, 2i64);
    let contiguous = AddressingConfig::padded(1, 12);
    let paged = contiguous.with_paged_cache(PagedCache::new(&table, 3, page_len * row_stride));
    for b in 0..2 {
        let c = BlockInfo::try_new(&contiguous, b).unwrap();
        let p = BlockInfo::try_new(&paged, b).unwrap();
        let base = c.key_row_offset(0, row_stride, b);
        for block in 0..3 {
            assert_eq!(
                c.try_paged_key_offset(0, row_stride, b, block, page_len).unwrap() - base,
                p.try_paged_key_offset(0, row_stride, b, block, page_len).unwrap(),
            );
        }
    }
}

#[test]
fn test_walk_reconstructs_direct_lookup() {
    let (batch, stride, num_pages, page_len, row_stride) = (4, 6, 11, 16usize, 32i64);
    let table = det_pages(batch * stride, num_pages, 1);
    let seqlens = [1, 16, 17, 96];
    let contiguous =
        AddressingConfig::padded(1, 1).with_key(KeyLayout::Lengths { seqlens: &seqlens });
    let paged = contiguous.with_paged_cache(PagedCache::new(
        &table,
        stride,
        page_len as i64 * row_stride,
    ));
    let batch_stride = (stride * page_len) as i64 * row_stride;

    for cfg in [contiguous, paged] {
        for b in 0..batch {
            let bi = BlockInfo::try_new(&cfg, b).unwrap();
            let n_blocks = bi.num_key_blocks(page_len).unwrap();
            let walk: Vec<_> = bi
                .try_key_blocks(batch_stride, row_stride, b, page_len)
                .unwrap()
                .collect();
            assert_eq!(walk.len(), n_blocks);
            for (i, &(block, offset)) in walk.iter().enumerate() {
                assert_eq!(block, n_blocks - 1 - i);
                let direct = bi
                    .try_paged_key_offset(batch_stride, row_stride, b, block, page_len as i64)
                    .unwrap();
                assert_eq!(offset, direct, "batch {b} block {block}");
            }
        }
    }
}

#[test]
fn test_manual_kernel_loop_accumulates_deltas() {
    let table = det_pages(8, 5, 2);
    let cfg = AddressingConfig::padded(1, 128).with_paged_cache(PagedCache::new(&table, 8, 1000));
    let bi = unsafe { BlockInfo::new_unchecked(&cfg, 0) };
    let n_block_max = bi.num_key_blocks(16).unwrap();
    assert_eq!(n_block_max, 8);

    let mut offset = unsafe { bi.paged_key_offset_unchecked(0, 1, 0, n_block_max - 1, 16) };
    for n_block in (1..n_block_max).rev() {
        offset += unsafe { bi.paged_key_advance_unchecked(0, n_block, 1, 16) };
        assert_eq!(offset, table[n_block - 1] as i64 * 1000);
    }
}

/// Host-built dense copy of each sequence's keys, like gathering the cache
/// through the block table with an index select.
fn dense_keys(cache: &[u32], table: &PageTable, seqlens: &[i32], page_len: usize) -> Vec<Vec<u32>> {
    seqlens
        .iter()
        .enumerate()
        .map(|(b, &len)| {
            let row = table.row(b).unwrap();
            (0..len as usize)
                .map(|t| {
                    let page = row[t / page_len] as usize;
                    cache[page * page_len + t % page_len]
                })
                .collect()
        })
        .collect()
}

#[test]
fn test_paged_gather_matches_index_select() {
    let (num_pages, page_len) = (10usize, 4usize);
    let cache: Vec<u32> = (0..(num_pages * page_len) as u32).collect();

    let cached = [3, 9, 1];
    let knew = 2;
    let totals: Vec<i32> = cached.iter().map(|&c| c + knew).collect();
    let tables: Vec<BlockTable> = totals
        .iter()
        .enumerate()
        .map(|(b, &t)| {
            let n = (t as usize).div_ceil(page_len);
            let pages = det_pages(n, num_pages, b).iter().map(|&p| p as u32).collect();
            BlockTable::new(page_len, pages, t as usize).unwrap()
        })
        .collect();
    let page_table = PageTable::from_block_tables(&tables, num_pages, 1).unwrap();

    let cfg = AddressingConfig::padded(1, 1)
        .with_key(KeyLayout::Lengths { seqlens: &cached })
        .with_new_keys(knew)
        .with_paged_cache(page_table.as_paged_cache());
    let strides = CacheStrides {
        batch_stride: 0,
        row_stride: 1,
        page_len,
        row_width: 1,
    };
    let gathered = gather_batch(&cache, &cfg, cached.len(), strides).unwrap();
    assert_eq!(gathered, dense_keys(&cache, &page_table, &totals, page_len));
}

#[test]
fn test_varlen_contiguous_gather() {
    // Packed keys [3, 5] with two elements per row.
    let cu = cumulative_from_lengths(&[3, 5]).unwrap();
    let cache: Vec<u32> = (0..16).collect();
    let cfg = AddressingConfig::padded(1, 1).with_key(KeyLayout::Cumulative { cu_seqlens: &cu });
    let strides = CacheStrides {
        batch_stride: 0,
        row_stride: 2,
        page_len: 2,
        row_width: 2,
    };
    let gathered = gather_batch(&cache, &cfg, 2, strides).unwrap();
    assert_eq!(gathered[0], (0..6).collect::<Vec<_>>());
    assert_eq!(gathered[1], (6..16).collect::<Vec<_>>());
}

#[test]
fn test_launch_params_drive_paged_gather() {
    let json = r#"{
        "batch_size": 2,
        "seqlen_q": 1,
        "seqlen_k": 0,
        "cu_seqlens_k": [5, 3],
        "is_seqlens_k_cumulative": false,
        "block_table": [2, 0, 1, 1],
        "block_table_batch_stride": 2,
        "cache_block_stride": 4,
        "num_cache_blocks": 3,
        "page_len": 4
    }"#;
    let params = LaunchParams::from_json(json).unwrap();
    let cache: Vec<u32> = (0..12).collect();
    let strides = CacheStrides {
        batch_stride: 0,
        row_stride: 1,
        page_len: 4,
        row_width: 1,
    };
    let gathered = gather_batch(&cache, &params.config(), params.batch_size, strides).unwrap();
    assert_eq!(gathered[0], vec![8, 9, 10, 11, 0]);
    assert_eq!(gathered[1], vec![4, 5, 6]);
}
