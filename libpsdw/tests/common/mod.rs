//! Minimal PSD reader used to check written documents.
#![allow(dead_code)]

use std::io::Read;

use flate2::read::ZlibDecoder;

pub struct Cursor<'a> {
    data: &'a [u8],
    pub pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn bytes(&mut self, len: usize) -> &'a [u8] {
        assert!(
            self.pos + len <= self.data.len(),
            "read of {} bytes at {} overruns {} byte stream",
            len,
            self.pos,
            self.data.len()
        );
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        out
    }

    pub fn u8(&mut self) -> u8 {
        self.bytes(1)[0]
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_be_bytes(self.bytes(2).try_into().unwrap())
    }

    pub fn i16(&mut self) -> i16 {
        i16::from_be_bytes(self.bytes(2).try_into().unwrap())
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_be_bytes(self.bytes(4).try_into().unwrap())
    }

    pub fn i32(&mut self) -> i32 {
        i32::from_be_bytes(self.bytes(4).try_into().unwrap())
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Decode one PackBits row, checking every control byte and the row length
pub fn packbits_decode_row(input: &[u8], width: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(width);
    let mut i = 0;

    while i < input.len() {
        let control = input[i] as i8;
        i += 1;
        assert_ne!(control, -128, "encoder never emits the no-op control byte");

        if control >= 0 {
            let count = control as usize + 1;
            assert!((1..=128).contains(&count), "literal length {count} out of range");
            out.extend_from_slice(&input[i..i + count]);
            i += count;
        } else {
            let count = (1 - i16::from(control)) as usize;
            assert!((2..=128).contains(&count), "run length {count} out of range");
            out.extend(std::iter::repeat(input[i]).take(count));
            i += 1;
        }
    }

    assert_eq!(out.len(), width, "decoded row length differs from declared width");
    out
}

pub fn inflate(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .expect("valid zlib stream");
    out
}

pub fn unpredict(data: &mut [u8], width: usize) {
    for row in data.chunks_exact_mut(width) {
        for x in 1..row.len() {
            row[x] = row[x].wrapping_add(row[x - 1]);
        }
    }
}

/// Decode `planes` planes of `width` x `height` that follow a compression tag
pub fn decode_planes(
    method: u16,
    cursor: &mut Cursor<'_>,
    payload_len: Option<usize>,
    width: usize,
    height: usize,
    planes: usize,
) -> Vec<Vec<u8>> {
    let plane_len = width * height;
    match method {
        0 => (0..planes).map(|_| cursor.bytes(plane_len).to_vec()).collect(),
        1 => {
            let lengths: Vec<usize> = (0..planes * height)
                .map(|_| cursor.u16() as usize)
                .collect();
            let mut decoded = Vec::with_capacity(planes);
            for plane_lengths in lengths.chunks(height) {
                let mut plane = Vec::with_capacity(plane_len);
                for &len in plane_lengths {
                    plane.extend(packbits_decode_row(cursor.bytes(len), width));
                }
                decoded.push(plane);
            }
            decoded
        }
        2 | 3 => {
            let stream = match payload_len {
                Some(len) => cursor.bytes(len),
                None => cursor.rest(),
            };
            let mut raw = inflate(stream);
            assert_eq!(raw.len(), plane_len * planes, "inflated size");
            if method == 3 {
                unpredict(&mut raw, width);
            }
            raw.chunks(plane_len.max(1)).map(<[u8]>::to_vec).collect()
        }
        other => panic!("unknown compression tag {other}"),
    }
}

/// Decode a tagged single-channel block
pub fn decode_channel_block(block: &[u8], width: usize, height: usize) -> (u16, Vec<u8>) {
    let mut cursor = Cursor::new(block);
    let method = cursor.u16();
    let payload = block.len() - 2;
    let mut planes = decode_planes(method, &mut cursor, Some(payload), width, height, 1);
    assert_eq!(cursor.remaining(), 0, "channel block has trailing bytes");
    (method, planes.remove(0))
}

#[derive(Debug)]
pub struct ParsedHeader {
    pub signature: [u8; 4],
    pub version: u16,
    pub reserved: [u8; 6],
    pub channels: u16,
    pub height: u32,
    pub width: u32,
    pub depth: u16,
    pub color_mode: u16,
}

#[derive(Debug)]
pub struct ParsedLayer {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    pub channel_ids: Vec<i16>,
    pub channel_lengths: Vec<u32>,
    pub blend_signature: [u8; 4],
    pub blend_key: [u8; 4],
    pub opacity: u8,
    pub clipping: u8,
    pub flags: u8,
    pub filler: u8,
    pub name: Vec<u8>,
    /// Tag and decoded plane of every channel, in declaration order
    pub channels: Vec<(u16, Vec<u8>)>,
}

#[derive(Debug)]
pub struct ParsedDocument {
    pub header: ParsedHeader,
    pub color_mode_len: u32,
    pub resources_len: u32,
    pub layer_and_mask_len: u32,
    pub layer_info_len: u32,
    pub layer_count: i16,
    pub layers: Vec<ParsedLayer>,
    pub global_mask_len: u32,
    pub composite_method: u16,
    pub composite: Vec<Vec<u8>>,
}

fn parse_layer_record(cursor: &mut Cursor<'_>) -> ParsedLayer {
    let top = cursor.i32();
    let left = cursor.i32();
    let bottom = cursor.i32();
    let right = cursor.i32();
    let channel_count = cursor.u16();
    let mut channel_ids = Vec::new();
    let mut channel_lengths = Vec::new();
    for _ in 0..channel_count {
        channel_ids.push(cursor.i16());
        channel_lengths.push(cursor.u32());
    }
    let blend_signature = cursor.bytes(4).try_into().unwrap();
    let blend_key = cursor.bytes(4).try_into().unwrap();
    let opacity = cursor.u8();
    let clipping = cursor.u8();
    let flags = cursor.u8();
    let filler = cursor.u8();

    let extra_len = cursor.u32() as usize;
    let extra_start = cursor.pos;
    assert_eq!(cursor.u32(), 0, "layer mask data length");
    assert_eq!(cursor.u32(), 0, "blending ranges length");
    let name_len = cursor.u8() as usize;
    let name = cursor.bytes(name_len).to_vec();
    let padded = (1 + name_len).div_ceil(4) * 4;
    for pad in cursor.bytes(padded - 1 - name_len) {
        assert_eq!(*pad, 0, "name padding must be zero");
    }
    assert_eq!(cursor.pos - extra_start, extra_len, "extra data length");

    ParsedLayer {
        top,
        left,
        bottom,
        right,
        channel_ids,
        channel_lengths,
        blend_signature,
        blend_key,
        opacity,
        clipping,
        flags,
        filler,
        name,
        channels: Vec::new(),
    }
}

/// Parse a complete document, asserting every length field and that nothing
/// trails the composite section
pub fn parse(data: &[u8]) -> ParsedDocument {
    let mut cursor = Cursor::new(data);

    let header = ParsedHeader {
        signature: cursor.bytes(4).try_into().unwrap(),
        version: cursor.u16(),
        reserved: cursor.bytes(6).try_into().unwrap(),
        channels: cursor.u16(),
        height: cursor.u32(),
        width: cursor.u32(),
        depth: cursor.u16(),
        color_mode: cursor.u16(),
    };

    let color_mode_len = cursor.u32();
    cursor.bytes(color_mode_len as usize);
    let resources_len = cursor.u32();
    cursor.bytes(resources_len as usize);

    let layer_and_mask_len = cursor.u32();
    let layer_and_mask_start = cursor.pos;

    let layer_info_len = cursor.u32();
    let layer_info_start = cursor.pos;
    let layer_count = cursor.i16();

    let mut layers: Vec<ParsedLayer> = (0..layer_count.unsigned_abs())
        .map(|_| parse_layer_record(&mut cursor))
        .collect();

    for layer in &mut layers {
        let width = (layer.right - layer.left) as usize;
        let height = (layer.bottom - layer.top) as usize;
        for &len in &layer.channel_lengths {
            let block = cursor.bytes(len as usize);
            layer.channels.push(decode_channel_block(block, width, height));
        }
    }

    if (cursor.pos - layer_info_start) % 2 == 1 {
        assert_eq!(cursor.u8(), 0, "layer info pad byte");
    }
    assert_eq!(
        cursor.pos - layer_info_start,
        layer_info_len as usize,
        "layer info length"
    );

    let global_mask_len = cursor.u32();
    cursor.bytes(global_mask_len as usize);
    assert_eq!(
        cursor.pos - layer_and_mask_start,
        layer_and_mask_len as usize,
        "layer and mask information length"
    );

    let composite_method = cursor.u16();
    let composite = decode_planes(
        composite_method,
        &mut cursor,
        None,
        header.width as usize,
        header.height as usize,
        header.channels as usize,
    );
    assert_eq!(cursor.remaining(), 0, "bytes trail the composite section");

    ParsedDocument {
        header,
        color_mode_len,
        resources_len,
        layer_and_mask_len,
        layer_info_len,
        layer_count,
        layers,
        global_mask_len,
        composite_method,
        composite,
    }
}

/// Interleave three composite planes back into RGB triples
pub fn composite_rgb(document: &ParsedDocument) -> Vec<[u8; 3]> {
    let [r, g, b] = [
        &document.composite[0],
        &document.composite[1],
        &document.composite[2],
    ];
    r.iter()
        .zip(g)
        .zip(b)
        .map(|((&r, &g), &b)| [r, g, b])
        .collect()
}
