use serde::{Deserialize, Serialize};

use super::state::PieceId;

pub const ORTHOGONAL: [(i32, i32); 4] = [(0, 1), (1, 0), (-1, 0), (0, -1)];

pub const SURROUNDING: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// 单次移动的最大步数。
pub const MOVE_RINGS: u8 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn is_adjacent(self, other: Coord) -> bool {
        self != other && (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    #[default]
    Normal,
    Selectable,
    Attackable,
}

/// 棋盘格子，最多容纳一个棋子。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cell {
    pub coord: Coord,
    #[serde(default)]
    pub highlight: Highlight,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupant: Option<PieceId>,
}

impl Cell {
    pub fn new(coord: Coord) -> Self {
        Self {
            coord,
            highlight: Highlight::Normal,
            occupant: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

/// 固定尺寸的棋盘，按列存储（先 x 后 y）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
}

impl Board {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let mut cells = Vec::with_capacity((width * height) as usize);
        for x in 0..width {
            for y in 0..height {
                cells.push(Cell::new(Coord::new(x, y)));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.x >= 0 && coord.y >= 0 && coord.x < self.width && coord.y < self.height
    }

    fn index_of(&self, coord: Coord) -> Option<usize> {
        if self.contains(coord) {
            Some((coord.x * self.height + coord.y) as usize)
        } else {
            None
        }
    }

    pub fn cell(&self, coord: Coord) -> Option<&Cell> {
        self.index_of(coord).and_then(|idx| self.cells.get(idx))
    }

    pub fn cell_mut(&mut self, coord: Coord) -> Option<&mut Cell> {
        let idx = self.index_of(coord)?;
        self.cells.get_mut(idx)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn occupant(&self, coord: Coord) -> Option<PieceId> {
        self.cell(coord).and_then(|cell| cell.occupant)
    }

    pub fn is_vacant(&self, coord: Coord) -> bool {
        self.cell(coord).map(Cell::is_empty).unwrap_or(false)
    }

    pub fn highlight(&self, coord: Coord) -> Highlight {
        self.cell(coord)
            .map(|cell| cell.highlight)
            .unwrap_or_default()
    }

    pub fn surrounding(&self, coord: Coord) -> Vec<Coord> {
        SURROUNDING
            .iter()
            .map(|(dx, dy)| coord.offset(*dx, *dy))
            .filter(|c| self.contains(*c))
            .collect()
    }

    pub fn orthogonal(&self, coord: Coord) -> Vec<Coord> {
        ORTHOGONAL
            .iter()
            .map(|(dx, dy)| coord.offset(*dx, *dy))
            .filter(|c| self.contains(*c))
            .collect()
    }

    /// 两步之内（仅直行、不穿过占用格）可到达的空格。
    pub fn reachable_from(&self, origin: Coord) -> Vec<Coord> {
        let mut reached: Vec<Coord> = Vec::new();
        let mut frontier = vec![origin];
        for _ in 0..MOVE_RINGS {
            let mut next = Vec::new();
            for from in &frontier {
                for step in self.orthogonal(*from) {
                    if step != origin && self.is_vacant(step) && !reached.contains(&step) {
                        reached.push(step);
                        next.push(step);
                    }
                }
            }
            frontier = next;
        }
        reached
    }

    pub fn with_highlight(&self, highlight: Highlight) -> Vec<Coord> {
        self.cells
            .iter()
            .filter(|cell| cell.highlight == highlight)
            .map(|cell| cell.coord)
            .collect()
    }

    pub fn vacant_cells(&self) -> Vec<Coord> {
        self.cells
            .iter()
            .filter(|cell| cell.is_empty())
            .map(|cell| cell.coord)
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.highlight = Highlight::Normal;
            cell.occupant = None;
        }
    }

    pub(crate) fn vacate(&mut self, coord: Coord) -> Option<PieceId> {
        self.cell_mut(coord).and_then(|cell| cell.occupant.take())
    }

    pub(crate) fn relocate(&mut self, from: Coord, to: Coord) -> bool {
        if !self.is_vacant(to) {
            return false;
        }
        match self.vacate(from) {
            Some(piece) => {
                if let Some(cell) = self.cell_mut(to) {
                    cell.occupant = Some(piece);
                }
                true
            }
            None => false,
        }
    }
}
